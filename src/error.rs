use thiserror::Error;

use crate::types::InstrumentError;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("communication timeout while awaiting instrument response")]
    CommunicationTimeout,
    #[error("unknown subsystem: {0}")]
    UnknownSubsystem(String),
    #[error("unknown parameter {parameter} in subsystem {subsystem}")]
    UnknownParameter {
        subsystem: String,
        parameter: String,
    },
    #[error("invalid value for {mnemonic}: {reason}")]
    InvalidParameter { mnemonic: String, reason: String },
    #[error("protocol framing error: {0}")]
    ProtocolFraming(String),
    #[error("malformed waveform preamble: {0}")]
    MalformedPreamble(String),
    #[error("binary block declared {declared} payload bytes but fewer arrived")]
    BlockLengthMismatch { declared: usize },
    #[error("unexpected response shape: {0}")]
    UnexpectedResponseShape(String),
    #[error("instrument rejected the operation: {}", describe_events(.0))]
    InstrumentRejected(Vec<InstrumentError>),
}

fn describe_events(events: &[InstrumentError]) -> String {
    events
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ScopeError {
    /// Map a transport-level read failure onto the protocol taxonomy. Read
    /// timeouts surface as `TimedOut` or `WouldBlock` depending on platform.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ScopeError::CommunicationTimeout
            }
            _ => ScopeError::Transport(err),
        }
    }
}
