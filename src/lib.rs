//! Control and data-acquisition client for Tektronix DPO2000/MSO2000 series
//! oscilloscopes over their SCPI raw-socket interface.
//!
//! The crate layers a typed client ([`ScopeClient`]) over a small protocol
//! engine: a command registry that validates parameters before they reach the
//! wire, a session that enforces one in-flight command/response pair, binary
//! block framing for `CURVE?` transfers, and error-queue draining so firmware
//! rejections surface as Rust errors instead of silently wrong settings.

pub mod client;
pub mod config;
pub mod error;
pub mod scpi;
pub mod transport;
pub mod types;

pub use client::{ScopeClient, ScopeClientBuilder};
pub use config::{ScopeConfig, load_config, load_config_or_default};
pub use error::ScopeError;
pub use scpi::waveform::{Waveform, WaveformPreamble};
pub use transport::{ConnectionConfig, TcpTransport, Transport};
pub use types::{
    AcquisitionMode, BinaryFormat, ByteOrder, Channel, Coupling, InstrumentError,
    TransferEncoding, TriggerMode, TriggerSlope, TriggerSource, WaveformSource,
};
