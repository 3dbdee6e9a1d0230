//! SCPI command encoding with parameter domain validation.
//!
//! Every command or query the crate sends is rendered here, from a
//! (subsystem, parameter, value) triple checked against a static registry of
//! the DPO2000/MSO2000 command surface this crate uses. Values outside a
//! parameter's declared domain are rejected before any bytes exist; silent
//! clamping would mask caller bugs that the instrument firmware then hides in
//! its event queue.

use crate::error::ScopeError;

/// A rendered SCPI command or query, ready for the session to transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpiRequest {
    text: String,
    expects_response: bool,
}

impl ScpiRequest {
    /// A fire-and-forget command (no response expected).
    pub fn command(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expects_response: false,
        }
    }

    /// A query; the session must read one terminated response for it.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expects_response: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expects_response(&self) -> bool {
        self.expects_response
    }
}

/// Typed value for a settable parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    /// Enumerated mnemonic, matched case-insensitively against the allow-list.
    Token(String),
    /// String argument carried in double quotes.
    Quoted(String),
    /// Boolean flag, rendered as 1/0.
    Flag(bool),
}

enum ParamDomain {
    Float { min: f64, max: f64 },
    Int { min: i64, max: i64 },
    Tokens(&'static [&'static str]),
    Quoted,
    Flag,
}

struct ParamSpec {
    name: &'static str,
    mnemonic: &'static str,
    domain: ParamDomain,
}

struct SubsystemSpec {
    name: &'static str,
    prefix: &'static str,
    params: &'static [ParamSpec],
}

const SOURCES: &[&str] = &["CH1", "CH2", "CH3", "CH4", "MATH", "REF1", "REF2"];

/// Vertical parameters shared by all four channel subsystems.
const CHANNEL_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "scale",
        mnemonic: "SCALE",
        domain: ParamDomain::Float {
            min: 1e-3,
            max: 500.0,
        },
    },
    ParamSpec {
        name: "position",
        mnemonic: "POSITION",
        domain: ParamDomain::Float {
            min: -5.0,
            max: 5.0,
        },
    },
    ParamSpec {
        name: "offset",
        mnemonic: "OFFSET",
        domain: ParamDomain::Float {
            min: -500.0,
            max: 500.0,
        },
    },
    ParamSpec {
        name: "coupling",
        mnemonic: "COUPLING",
        domain: ParamDomain::Tokens(&["AC", "DC", "GND"]),
    },
    ParamSpec {
        name: "probe_gain",
        mnemonic: "PROBE:GAIN",
        domain: ParamDomain::Float {
            min: 1e-3,
            max: 1e3,
        },
    },
    ParamSpec {
        name: "label",
        mnemonic: "LABEL",
        domain: ParamDomain::Quoted,
    },
];

const HORIZONTAL_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "scale",
        mnemonic: "SCALE",
        domain: ParamDomain::Float {
            min: 1e-9,
            max: 100.0,
        },
    },
    ParamSpec {
        name: "delay_time",
        mnemonic: "DELAY:TIME",
        domain: ParamDomain::Float {
            min: -5e3,
            max: 5e3,
        },
    },
];

const TRIGGER_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "type",
        mnemonic: "TYPE",
        domain: ParamDomain::Tokens(&["EDGE", "PULSE"]),
    },
    ParamSpec {
        name: "mode",
        mnemonic: "MODE",
        domain: ParamDomain::Tokens(&["AUTO", "NORMAL"]),
    },
    ParamSpec {
        name: "level",
        mnemonic: "LEVEL",
        domain: ParamDomain::Float {
            min: -1e3,
            max: 1e3,
        },
    },
    ParamSpec {
        name: "edge_source",
        mnemonic: "EDGE:SOURCE",
        domain: ParamDomain::Tokens(&["CH1", "CH2", "CH3", "CH4", "EXT", "LINE", "AUX"]),
    },
    ParamSpec {
        name: "edge_slope",
        mnemonic: "EDGE:SLOPE",
        domain: ParamDomain::Tokens(&["RISE", "FALL"]),
    },
];

const ACQUIRE_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "state",
        mnemonic: "STATE",
        domain: ParamDomain::Tokens(&["RUN", "STOP"]),
    },
    ParamSpec {
        name: "mode",
        mnemonic: "MODE",
        domain: ParamDomain::Tokens(&["SAMPLE", "PEAKDETECT", "HIRES", "AVERAGE", "ENVELOPE"]),
    },
    ParamSpec {
        name: "stop_after",
        mnemonic: "STOPAFTER",
        domain: ParamDomain::Tokens(&["RUNSTOP", "SEQUENCE"]),
    },
    ParamSpec {
        name: "num_averages",
        mnemonic: "NUMAVG",
        domain: ParamDomain::Int { min: 2, max: 512 },
    },
];

const DATA_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "source",
        mnemonic: "SOURCE",
        domain: ParamDomain::Tokens(SOURCES),
    },
    ParamSpec {
        name: "encoding",
        mnemonic: "ENCDG",
        domain: ParamDomain::Tokens(&[
            "ASCII",
            "RIBINARY",
            "RPBINARY",
            "SRIBINARY",
            "SRPBINARY",
        ]),
    },
    ParamSpec {
        name: "start",
        mnemonic: "START",
        domain: ParamDomain::Int {
            min: 1,
            max: 125_000_000,
        },
    },
    ParamSpec {
        name: "stop",
        mnemonic: "STOP",
        domain: ParamDomain::Int {
            min: 1,
            max: 125_000_000,
        },
    },
    ParamSpec {
        name: "width",
        mnemonic: "WIDTH",
        domain: ParamDomain::Int { min: 1, max: 2 },
    },
];

const SELECT_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "ch1",
        mnemonic: "CH1",
        domain: ParamDomain::Flag,
    },
    ParamSpec {
        name: "ch2",
        mnemonic: "CH2",
        domain: ParamDomain::Flag,
    },
    ParamSpec {
        name: "ch3",
        mnemonic: "CH3",
        domain: ParamDomain::Flag,
    },
    ParamSpec {
        name: "ch4",
        mnemonic: "CH4",
        domain: ParamDomain::Flag,
    },
];

const WFMOUTPRE_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "byte_width",
        mnemonic: "BYT_NR",
        domain: ParamDomain::Int { min: 1, max: 2 },
    },
    ParamSpec {
        name: "record_length",
        mnemonic: "RECORDLENGTH",
        domain: ParamDomain::Int {
            min: 0,
            max: 125_000_000,
        },
    },
];

const SUBSYSTEMS: &[SubsystemSpec] = &[
    SubsystemSpec {
        name: "ch1",
        prefix: "CH1",
        params: CHANNEL_PARAMS,
    },
    SubsystemSpec {
        name: "ch2",
        prefix: "CH2",
        params: CHANNEL_PARAMS,
    },
    SubsystemSpec {
        name: "ch3",
        prefix: "CH3",
        params: CHANNEL_PARAMS,
    },
    SubsystemSpec {
        name: "ch4",
        prefix: "CH4",
        params: CHANNEL_PARAMS,
    },
    SubsystemSpec {
        name: "horizontal",
        prefix: "HORIZONTAL",
        params: HORIZONTAL_PARAMS,
    },
    SubsystemSpec {
        name: "trigger",
        prefix: "TRIGGER:A",
        params: TRIGGER_PARAMS,
    },
    SubsystemSpec {
        name: "acquire",
        prefix: "ACQUIRE",
        params: ACQUIRE_PARAMS,
    },
    SubsystemSpec {
        name: "data",
        prefix: "DATA",
        params: DATA_PARAMS,
    },
    SubsystemSpec {
        name: "select",
        prefix: "SELECT",
        params: SELECT_PARAMS,
    },
    SubsystemSpec {
        name: "wfmoutpre",
        prefix: "WFMOUTPRE",
        params: WFMOUTPRE_PARAMS,
    },
];

fn lookup(subsystem: &str, parameter: &str) -> Result<(&'static SubsystemSpec, &'static ParamSpec), ScopeError> {
    let sub = SUBSYSTEMS
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(subsystem))
        .ok_or_else(|| ScopeError::UnknownSubsystem(subsystem.to_string()))?;
    let param = sub
        .params
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(parameter))
        .ok_or_else(|| ScopeError::UnknownParameter {
            subsystem: subsystem.to_string(),
            parameter: parameter.to_string(),
        })?;
    Ok((sub, param))
}

fn invalid(mnemonic: &str, reason: impl Into<String>) -> ScopeError {
    ScopeError::InvalidParameter {
        mnemonic: mnemonic.to_string(),
        reason: reason.into(),
    }
}

fn render(mnemonic: &str, domain: &ParamDomain, value: &ParamValue) -> Result<String, ScopeError> {
    match (domain, value) {
        (ParamDomain::Float { min, max }, ParamValue::Float(v)) => {
            if !v.is_finite() {
                return Err(invalid(mnemonic, "value must be finite"));
            }
            if v < min || v > max {
                return Err(invalid(
                    mnemonic,
                    format!("{v} outside allowed range {min}..={max}"),
                ));
            }
            Ok(format!("{v:E}"))
        }
        (ParamDomain::Int { min, max }, ParamValue::Int(v)) => {
            if v < min || v > max {
                return Err(invalid(
                    mnemonic,
                    format!("{v} outside allowed range {min}..={max}"),
                ));
            }
            Ok(v.to_string())
        }
        (ParamDomain::Tokens(allowed), ParamValue::Token(tok)) => allowed
            .iter()
            .find(|t| t.eq_ignore_ascii_case(tok))
            .map(|t| t.to_string())
            .ok_or_else(|| {
                invalid(
                    mnemonic,
                    format!("{tok:?} is not one of {}", allowed.join("|")),
                )
            }),
        (ParamDomain::Quoted, ParamValue::Quoted(s)) => {
            if s.contains(['\n', '\r']) {
                return Err(invalid(mnemonic, "string argument may not contain newlines"));
            }
            Ok(format!("\"{}\"", s.replace('"', "\"\"")))
        }
        (ParamDomain::Flag, ParamValue::Flag(b)) => Ok(if *b { "1" } else { "0" }.to_string()),
        _ => Err(invalid(mnemonic, "value type does not match parameter domain")),
    }
}

/// Encode a state-changing command for one parameter.
pub fn set(subsystem: &str, parameter: &str, value: ParamValue) -> Result<ScpiRequest, ScopeError> {
    let (sub, param) = lookup(subsystem, parameter)?;
    let mnemonic = format!("{}:{}", sub.prefix, param.mnemonic);
    let rendered = render(&mnemonic, &param.domain, &value)?;
    Ok(ScpiRequest::command(format!("{mnemonic} {rendered}")))
}

/// Encode a query for one parameter.
pub fn query(subsystem: &str, parameter: &str) -> Result<ScpiRequest, ScopeError> {
    let (sub, param) = lookup(subsystem, parameter)?;
    Ok(ScpiRequest::query(format!(
        "{}:{}?",
        sub.prefix, param.mnemonic
    )))
}

/// Encode a whole-subsystem query, e.g. `WFMOUTPRE?` for the full preamble.
pub fn query_subsystem(subsystem: &str) -> Result<ScpiRequest, ScopeError> {
    let sub = SUBSYSTEMS
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(subsystem))
        .ok_or_else(|| ScopeError::UnknownSubsystem(subsystem.to_string()))?;
    Ok(ScpiRequest::query(format!("{}?", sub.prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_renders_mnemonic_and_value() {
        let req = set("ch1", "scale", ParamValue::Float(0.1)).unwrap();
        assert_eq!(req.text(), "CH1:SCALE 1E-1");
        assert!(!req.expects_response());
    }

    #[test]
    fn query_gets_trailing_question_mark() {
        let req = query("horizontal", "scale").unwrap();
        assert_eq!(req.text(), "HORIZONTAL:SCALE?");
        assert!(req.expects_response());
    }

    #[test]
    fn out_of_range_float_is_rejected_not_clamped() {
        let err = set("ch1", "position", ParamValue::Float(12.0)).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidParameter { .. }));
    }

    #[test]
    fn nan_is_rejected() {
        let err = set("trigger", "level", ParamValue::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidParameter { .. }));
    }

    #[test]
    fn token_is_canonicalized_case_insensitively() {
        let req = set("ch2", "coupling", ParamValue::Token("dc".into())).unwrap();
        assert_eq!(req.text(), "CH2:COUPLING DC");
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = set("ch2", "coupling", ParamValue::Token("DCREJ".into())).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidParameter { .. }));
    }

    #[test]
    fn unknown_subsystem_and_parameter() {
        assert!(matches!(
            set("wavegen", "scale", ParamValue::Float(1.0)),
            Err(ScopeError::UnknownSubsystem(_))
        ));
        assert!(matches!(
            set("ch1", "bandwidth", ParamValue::Float(1.0)),
            Err(ScopeError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn type_mismatch_is_invalid_parameter() {
        let err = set("ch1", "scale", ParamValue::Token("BIG".into())).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidParameter { .. }));
    }

    #[test]
    fn flag_renders_numeric() {
        let req = set("select", "ch3", ParamValue::Flag(true)).unwrap();
        assert_eq!(req.text(), "SELECT:CH3 1");
    }

    #[test]
    fn quoted_string_doubles_embedded_quotes() {
        let req = set("ch1", "label", ParamValue::Quoted("a \"b\"".into())).unwrap();
        assert_eq!(req.text(), "CH1:LABEL \"a \"\"b\"\"\"");
    }

    #[test]
    fn whole_subsystem_query() {
        let req = query_subsystem("wfmoutpre").unwrap();
        assert_eq!(req.text(), "WFMOUTPRE?");
    }
}
