pub mod command;
pub mod response;
pub mod session;
pub mod waveform;

// Re-export the protocol-facing types
pub use command::{ParamValue, ScpiRequest};
pub use session::ScpiSession;
pub use waveform::{Waveform, WaveformPreamble};
