use log::debug;

use crate::error::ScopeError;
use crate::scpi::command::{self, ParamValue, ScpiRequest};
use crate::scpi::session::ScpiSession;
use crate::transport::{ConnectionConfig, TcpTransport, Transport};
use crate::types::TransferEncoding;

pub mod acquisition;
pub mod channel;
pub mod timebase;
pub mod trigger;
pub mod waveform;

/// Builder for constructing [`ScopeClient`] instances.
///
/// Either an address/port pair (opened as a raw TCP socket session) or a
/// pre-opened [`Transport`] must be supplied; the latter is how VXI-11 or
/// USBTMC bridges plug in without this crate owning their session lifecycle.
///
/// # Examples
///
/// ```no_run
/// use tekscope::ScopeClient;
///
/// let mut scope = ScopeClient::builder()
///     .address("192.168.1.40")
///     .port(4000)
///     .build()?;
/// println!("connected to {} {}", scope.make(), scope.model());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct ScopeClientBuilder {
    address: Option<String>,
    port: Option<u16>,
    config: ConnectionConfig,
    transport: Option<Box<dyn Transport>>,
    transfer: TransferEncoding,
    start_acquisition: bool,
}

impl ScopeClientBuilder {
    fn new() -> Self {
        Self {
            start_acquisition: true,
            ..Default::default()
        }
    }

    pub fn address(mut self, addr: &str) -> Self {
        self.address = Some(addr.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the full connection configuration (timeouts).
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an already-open transport instead of dialing TCP.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Binary encoding requested for waveform transfers.
    pub fn transfer_encoding(mut self, transfer: TransferEncoding) -> Self {
        self.transfer = transfer;
        self
    }

    /// Whether to put the acquisition system into RUN as part of connecting
    /// (on by default, matching front-panel expectations).
    pub fn start_acquisition(mut self, start: bool) -> Self {
        self.start_acquisition = start;
        self
    }

    /// Connect, identify the instrument and return a ready client.
    pub fn build(self) -> Result<ScopeClient, ScopeError> {
        let transport: Box<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let address = self.address.ok_or_else(|| ScopeError::InvalidParameter {
                    mnemonic: "address".to_string(),
                    reason: "an address or a transport must be specified".to_string(),
                })?;
                let port = self.port.ok_or_else(|| ScopeError::InvalidParameter {
                    mnemonic: "port".to_string(),
                    reason: "a port or a transport must be specified".to_string(),
                })?;
                Box::new(TcpTransport::connect(&address, port, &self.config)?)
            }
        };

        let mut session = ScpiSession::new(transport);

        let idn = session.query(&ScpiRequest::query("*IDN?"))?;
        let mut fields = idn.split(',');
        let (make, model) = match (fields.next(), fields.next()) {
            (Some(make), Some(model)) => (make.trim().to_string(), model.trim().to_string()),
            _ => {
                return Err(ScopeError::UnexpectedResponseShape(format!(
                    "*IDN? answered {idn:?}"
                )));
            }
        };
        debug!("connected to {make} {model}");

        let mut client = ScopeClient {
            session,
            make,
            model,
            transfer: self.transfer,
        };
        if self.start_acquisition {
            client.run()?;
        }
        Ok(client)
    }
}

/// Control client for Tektronix DPO2000/MSO2000 series oscilloscopes.
///
/// Wraps one SCPI session and exposes the instrument's subsystems as typed
/// operations: vertical (channel), horizontal (timebase), trigger,
/// acquisition and waveform transfer. Exactly one operation runs at a time;
/// to share a client across threads put it behind a `parking_lot::Mutex`,
/// which also serializes the command/response pairs on the wire.
///
/// # Examples
///
/// ```no_run
/// use tekscope::{Channel, ScopeClient};
///
/// let mut scope = ScopeClient::new("192.168.1.40", 4000)?;
/// scope.set_channel_scale(Channel::Ch1, 0.1)?;
/// let waveform = scope.fetch_waveform(Channel::Ch1)?;
/// println!("{} points", waveform.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ScopeClient {
    session: ScpiSession,
    make: String,
    model: String,
    transfer: TransferEncoding,
}

impl std::fmt::Debug for ScopeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeClient")
            .field("make", &self.make)
            .field("model", &self.model)
            .field("transfer", &self.transfer)
            .finish_non_exhaustive()
    }
}

impl ScopeClient {
    /// Connect over TCP with default configuration.
    pub fn new(addr: &str, port: u16) -> Result<Self, ScopeError> {
        Self::builder().address(addr).port(port).build()
    }

    pub fn builder() -> ScopeClientBuilder {
        ScopeClientBuilder::new()
    }

    /// Manufacturer string from `*IDN?`.
    pub fn make(&self) -> &str {
        &self.make
    }

    /// Model string from `*IDN?`.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Encoding used for waveform transfers.
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer
    }

    pub fn set_transfer_encoding(&mut self, transfer: TransferEncoding) {
        self.transfer = transfer;
    }

    /// Restore factory default settings (`*RST`).
    pub fn reset(&mut self) -> Result<(), ScopeError> {
        self.session.send(&ScpiRequest::command("*RST"))?;
        self.session.check_error_queue()
    }

    /// Set one registered parameter and verify the instrument accepted it by
    /// draining the event queue. This is the generic escape hatch behind the
    /// typed setters; `subsystem`/`parameter` follow the command registry
    /// (`"ch1"`/`"scale"`, `"trigger"`/`"level"`, ...).
    pub fn set_param(
        &mut self,
        subsystem: &str,
        parameter: &str,
        value: ParamValue,
    ) -> Result<(), ScopeError> {
        let request = command::set(subsystem, parameter, value)?;
        self.session.send(&request)?;
        self.session.check_error_queue()
    }

    /// Query one registered parameter, returning the raw response text.
    pub fn query_param(&mut self, subsystem: &str, parameter: &str) -> Result<String, ScopeError> {
        let request = command::query(subsystem, parameter)?;
        self.session.query(&request)
    }

    pub(crate) fn session(&mut self) -> &mut ScpiSession {
        &mut self.session
    }
}
