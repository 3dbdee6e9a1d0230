use super::ScopeClient;
use crate::error::ScopeError;
use crate::scpi::command::ParamValue;
use crate::scpi::response::parse_f64;
use crate::types::{TriggerMode, TriggerSlope, TriggerSource};

impl ScopeClient {
    /// Select the edge trigger type (`TRIGGER:A:TYPE EDGE`). The remaining
    /// trigger setters configure the edge trigger and assume this has been
    /// selected.
    pub fn use_edge_trigger(&mut self) -> Result<(), ScopeError> {
        self.set_param("trigger", "type", ParamValue::Token("EDGE".to_string()))
    }

    /// Set the edge trigger source (`TRIGGER:A:EDGE:SOURCE`).
    pub fn set_trigger_source(&mut self, source: TriggerSource) -> Result<(), ScopeError> {
        self.set_param(
            "trigger",
            "edge_source",
            ParamValue::Token(source.mnemonic().to_string()),
        )
    }

    pub fn trigger_source(&mut self) -> Result<TriggerSource, ScopeError> {
        let reply = self.query_param("trigger", "edge_source")?;
        TriggerSource::from_response(&reply)
    }

    /// Set the A-trigger level in volts (`TRIGGER:A:LEVEL`).
    pub fn set_trigger_level(&mut self, volts: f64) -> Result<(), ScopeError> {
        self.set_param("trigger", "level", ParamValue::Float(volts))
    }

    pub fn trigger_level(&mut self) -> Result<f64, ScopeError> {
        let reply = self.query_param("trigger", "level")?;
        parse_f64(&reply)
    }

    /// Set the edge trigger slope (`TRIGGER:A:EDGE:SLOPE`).
    pub fn set_trigger_slope(&mut self, slope: TriggerSlope) -> Result<(), ScopeError> {
        self.set_param(
            "trigger",
            "edge_slope",
            ParamValue::Token(slope.mnemonic().to_string()),
        )
    }

    pub fn trigger_slope(&mut self) -> Result<TriggerSlope, ScopeError> {
        let reply = self.query_param("trigger", "edge_slope")?;
        TriggerSlope::from_response(&reply)
    }

    /// Set the A-trigger mode (`TRIGGER:A:MODE`): AUTO free-runs without a
    /// trigger event, NORMAL waits for one.
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<(), ScopeError> {
        self.set_param(
            "trigger",
            "mode",
            ParamValue::Token(mode.mnemonic().to_string()),
        )
    }

    pub fn trigger_mode(&mut self) -> Result<TriggerMode, ScopeError> {
        let reply = self.query_param("trigger", "mode")?;
        TriggerMode::from_response(&reply)
    }
}
