//! Decoding of textual query responses.
//!
//! Responses arrive as terminator-stripped ASCII. Comma-separated records are
//! split with awareness of double-quoted fields, because the waveform id
//! string the preamble carries ("Ch1, DC coupling, ...") legitimately
//! contains commas.

use crate::error::ScopeError;
use crate::types::InstrumentError;

/// Split a comma-separated record, honoring double-quoted fields. Quotes are
/// kept on the field so callers can tell a quoted string from a bare token.
pub fn split_fields(response: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in response.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Strip one level of surrounding double quotes and collapse doubled quotes.
pub fn unquote(field: &str) -> String {
    let trimmed = field.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

pub fn parse_f64(field: &str) -> Result<f64, ScopeError> {
    field.trim().parse::<f64>().map_err(|_| {
        ScopeError::UnexpectedResponseShape(format!("expected a number, got {field:?}"))
    })
}

pub fn parse_i64(field: &str) -> Result<i64, ScopeError> {
    let trimmed = field.trim();
    // Instruments report integers in scientific notation depending on the
    // HEADER/VERBOSE settings, so fall back through f64.
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    let v = trimmed.parse::<f64>().map_err(|_| {
        ScopeError::UnexpectedResponseShape(format!("expected an integer, got {field:?}"))
    })?;
    if v.fract() != 0.0 {
        return Err(ScopeError::UnexpectedResponseShape(format!(
            "expected an integer, got {field:?}"
        )));
    }
    Ok(v as i64)
}

pub fn parse_flag(field: &str) -> Result<bool, ScopeError> {
    match field.trim().to_ascii_uppercase().as_str() {
        "1" | "ON" => Ok(true),
        "0" | "OFF" => Ok(false),
        other => Err(ScopeError::UnexpectedResponseShape(format!(
            "expected a 0/1 flag, got {other:?}"
        ))),
    }
}

/// Parse one `EVMSG?` reply: `<code>,"<message>"`. Code 0 is the sentinel
/// for an empty event queue.
pub fn parse_event(response: &str) -> Result<InstrumentError, ScopeError> {
    let fields = split_fields(response);
    if fields.len() < 2 {
        return Err(ScopeError::UnexpectedResponseShape(format!(
            "event response needs code and message, got {response:?}"
        )));
    }
    let code = parse_i64(&fields[0])? as i32;
    let message = unquote(&fields[1..].join(","));
    Ok(InstrumentError { code, message })
}

/// Assert an exact field count before positional decoding.
pub fn expect_fields(fields: &[String], expected: usize) -> Result<(), ScopeError> {
    if fields.len() != expected {
        return Err(ScopeError::UnexpectedResponseShape(format!(
            "expected {expected} fields, got {}",
            fields.len()
        )));
    }
    Ok(())
}
