//! Command/response sequencing against the instrument's single interpreter.
//!
//! The scope processes exactly one command or query at a time over a session;
//! interleaving a second command while a response is outstanding corrupts the
//! byte stream for both. `ScpiSession` owns the transport and enforces the
//! ordering through `&mut self` plus an explicit state check, so a caller
//! sharing a session across threads only needs to wrap it in a mutex
//! (`parking_lot::Mutex<ScopeClient>` is the intended shape).

use log::{debug, trace};
use std::io;

use crate::error::ScopeError;
use crate::scpi::command::ScpiRequest;
use crate::scpi::response::parse_event;
use crate::transport::Transport;
use crate::types::InstrumentError;

/// Line terminator for both directions of the SCPI text protocol.
pub const TERMINATOR: u8 = b'\n';

/// The DPO2000 event queue holds at most 33 entries; a drain that loops past
/// this never reaches the sentinel and indicates a desynchronized stream.
const MAX_EVENT_DRAIN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    AwaitingResponse,
}

pub struct ScpiSession {
    transport: Box<dyn Transport>,
    state: SessionState,
}

impl ScpiSession {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Idle,
        }
    }

    fn write_request(&mut self, request: &ScpiRequest) -> Result<(), ScopeError> {
        if self.state != SessionState::Idle {
            return Err(ScopeError::ProtocolFraming(
                "command issued while a response is outstanding".to_string(),
            ));
        }
        trace!("-> {}", request.text());
        let mut bytes = request.text().as_bytes().to_vec();
        bytes.push(TERMINATOR);
        self.transport.write_all(&bytes)?;
        Ok(())
    }

    /// Send a fire-and-forget command.
    pub fn send(&mut self, request: &ScpiRequest) -> Result<(), ScopeError> {
        debug_assert!(!request.expects_response());
        self.write_request(request)
    }

    /// Send a query and block for its terminated response, returning the
    /// terminator-stripped text. A read timeout returns the session to idle
    /// and surfaces as `CommunicationTimeout`; it is never retried here,
    /// since resending a SCPI command can have side effects.
    pub fn query(&mut self, request: &ScpiRequest) -> Result<String, ScopeError> {
        debug_assert!(request.expects_response());
        self.write_request(request)?;
        self.state = SessionState::AwaitingResponse;

        let result = self.transport.read_until(TERMINATOR);
        self.state = SessionState::Idle;
        let raw = result.map_err(ScopeError::from_read)?;

        if raw.last() != Some(&TERMINATOR) {
            return Err(ScopeError::ProtocolFraming(format!(
                "unterminated response to {:?}",
                request.text()
            )));
        }
        let mut text = String::from_utf8(raw).map_err(|_| {
            ScopeError::ProtocolFraming(format!("non-ASCII response to {:?}", request.text()))
        })?;
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        trace!("<- {text}");
        Ok(text)
    }

    /// `*OPC?` completion handshake: blocks until the instrument has finished
    /// processing all previously issued commands. Required before a waveform
    /// transfer so the curve reflects the configuration just written.
    pub fn wait_operation_complete(&mut self) -> Result<(), ScopeError> {
        let reply = self.query(&ScpiRequest::query("*OPC?"))?;
        if reply.trim() != "1" {
            return Err(ScopeError::UnexpectedResponseShape(format!(
                "*OPC? answered {reply:?}"
            )));
        }
        Ok(())
    }

    /// Send a query whose response is a definite-length binary block and
    /// return the payload bytes. The payload is read by count, never by
    /// terminator: terminator-valued bytes occur legitimately inside sample
    /// data.
    pub fn query_block(&mut self, request: &ScpiRequest) -> Result<Vec<u8>, ScopeError> {
        debug_assert!(request.expects_response());
        self.write_request(request)?;
        self.state = SessionState::AwaitingResponse;
        let result = self.read_block();
        self.state = SessionState::Idle;
        result
    }

    fn read_header_byte(&mut self) -> Result<u8, ScopeError> {
        let byte = self
            .transport
            .read_exact_bytes(1)
            .map_err(ScopeError::from_read)?;
        Ok(byte[0])
    }

    fn read_block(&mut self) -> Result<Vec<u8>, ScopeError> {
        let marker = self.read_header_byte()?;
        if marker != b'#' {
            return Err(ScopeError::ProtocolFraming(format!(
                "binary block must start with '#', got 0x{marker:02x}"
            )));
        }

        let digit = self.read_header_byte()?;
        if !digit.is_ascii_digit() {
            return Err(ScopeError::ProtocolFraming(format!(
                "binary block digit count is not a digit: 0x{digit:02x}"
            )));
        }
        let digit_count = (digit - b'0') as usize;
        if digit_count == 0 {
            // '#0' announces an indefinite-length block, which the scope
            // never produces for CURVE? and we cannot frame safely.
            return Err(ScopeError::ProtocolFraming(
                "indefinite-length binary block is not supported".to_string(),
            ));
        }

        let length_field = self
            .transport
            .read_exact_bytes(digit_count)
            .map_err(ScopeError::from_read)?;
        let declared: usize = std::str::from_utf8(&length_field)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ScopeError::ProtocolFraming(format!(
                    "binary block length field is not numeric: {length_field:?}"
                ))
            })?;

        let payload = self
            .transport
            .read_exact_bytes(declared)
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::UnexpectedEof => {
                    ScopeError::BlockLengthMismatch { declared }
                }
                _ => ScopeError::Transport(e),
            })?;

        let trailer = self.read_header_byte()?;
        if trailer != TERMINATOR {
            return Err(ScopeError::ProtocolFraming(format!(
                "binary block not followed by terminator, got 0x{trailer:02x}"
            )));
        }

        debug!("read binary block of {declared} bytes");
        Ok(payload)
    }

    /// Drain the instrument's event queue until the "no events" sentinel
    /// (code 0), returning the collected entries in FIFO order. The queue is
    /// always drained completely; a partial drain would leave stale entries
    /// to be misattributed to the next operation.
    pub fn drain_error_queue(&mut self) -> Result<Vec<InstrumentError>, ScopeError> {
        let mut events = Vec::new();
        for _ in 0..MAX_EVENT_DRAIN {
            let reply = self.query(&ScpiRequest::query("EVMSG?"))?;
            let event = parse_event(&reply)?;
            if event.code == 0 {
                return Ok(events);
            }
            debug!("instrument event {}: {}", event.code, event.message);
            events.push(event);
        }
        Err(ScopeError::ProtocolFraming(
            "event queue drain never reached the empty sentinel".to_string(),
        ))
    }

    /// Drain the event queue and fail the enclosing batch if it was not
    /// empty. This is how a syntactically valid command the firmware rejects
    /// becomes visible, even though the transport saw no failure.
    pub fn check_error_queue(&mut self) -> Result<(), ScopeError> {
        let events = self.drain_error_queue()?;
        if events.is_empty() {
            Ok(())
        } else {
            Err(ScopeError::InstrumentRejected(events))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn session(mock: MockTransport) -> ScpiSession {
        ScpiSession::new(Box::new(mock))
    }

    #[test]
    fn query_strips_terminator_and_records_write() {
        let mock = MockTransport::new().reply_line("TEKTRONIX,DPO2024,C000000,FV:1.00");
        let writes = mock.writes();
        let mut s = session(mock);
        let reply = s.query(&ScpiRequest::query("*IDN?")).unwrap();
        assert_eq!(reply, "TEKTRONIX,DPO2024,C000000,FV:1.00");
        assert_eq!(writes.lock().unwrap().as_slice(), ["*IDN?"]);
    }

    #[test]
    fn timeout_surfaces_and_session_stays_usable() {
        let mock = MockTransport::new().reply_timeout().reply_line("1");
        let mut s = session(mock);
        let err = s.query(&ScpiRequest::query("*OPC?")).unwrap_err();
        assert!(matches!(err, ScopeError::CommunicationTimeout));
        // Next operation goes through once a response arrives.
        s.wait_operation_complete().unwrap();
    }

    #[test]
    fn unterminated_response_is_framing_error() {
        let mock = MockTransport::new().reply_raw(b"PARTIAL".to_vec());
        let mut s = session(mock);
        let err = s.query(&ScpiRequest::query("ACQUIRE:MODE?")).unwrap_err();
        assert!(matches!(err, ScopeError::ProtocolFraming(_)));
    }

    #[test]
    fn opc_rejects_anything_but_one() {
        let mock = MockTransport::new().reply_line("0");
        let mut s = session(mock);
        let err = s.wait_operation_complete().unwrap_err();
        assert!(matches!(err, ScopeError::UnexpectedResponseShape(_)));
    }

    #[test]
    fn block_read_returns_exact_payload() {
        let mut block = b"#212".to_vec();
        block.extend_from_slice(&[7u8; 12]);
        block.push(b'\n');
        let mock = MockTransport::new().reply_raw(block);
        let mut s = session(mock);
        let payload = s.query_block(&ScpiRequest::query("CURVE?")).unwrap();
        assert_eq!(payload, vec![7u8; 12]);
    }

    #[test]
    fn terminator_byte_inside_payload_is_not_a_boundary() {
        let mut block = b"#14".to_vec();
        block.extend_from_slice(&[b'\n', 0x00, b'\n', 0x01]);
        block.push(b'\n');
        let mock = MockTransport::new().reply_raw(block);
        let mut s = session(mock);
        let payload = s.query_block(&ScpiRequest::query("CURVE?")).unwrap();
        assert_eq!(payload, vec![b'\n', 0x00, b'\n', 0x01]);
    }

    #[test]
    fn short_block_is_length_mismatch() {
        // Declares 12 payload bytes but the stream times out after 11.
        let mut block = b"#212".to_vec();
        block.extend_from_slice(&[7u8; 11]);
        let mock = MockTransport::new().reply_raw(block);
        let mut s = session(mock);
        let err = s.query_block(&ScpiRequest::query("CURVE?")).unwrap_err();
        assert!(matches!(
            err,
            ScopeError::BlockLengthMismatch { declared: 12 }
        ));
    }

    #[test]
    fn missing_marker_is_framing_error() {
        let mock = MockTransport::new().reply_raw(b"2202,\"oops\"\n".to_vec());
        let mut s = session(mock);
        let err = s.query_block(&ScpiRequest::query("CURVE?")).unwrap_err();
        assert!(matches!(err, ScopeError::ProtocolFraming(_)));
    }

    #[test]
    fn drain_collects_events_in_order_until_sentinel() {
        let mock = MockTransport::new()
            .reply_line("113,\"Undefined header; Command not found\"")
            .reply_line("410,\"Query INTERRUPTED\"")
            .reply_no_events();
        let mut s = session(mock);
        let events = s.drain_error_queue().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, 113);
        assert_eq!(events[1].code, 410);
    }

    #[test]
    fn check_error_queue_rejects_batch_with_exact_entries() {
        let mock = MockTransport::new()
            .reply_line("2202,\"Set value out of range\"")
            .reply_no_events();
        let mut s = session(mock);
        let err = s.check_error_queue().unwrap_err();
        match err {
            ScopeError::InstrumentRejected(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].code, 2202);
                assert_eq!(events[0].message, "Set value out of range");
            }
            other => panic!("expected InstrumentRejected, got {other:?}"),
        }
    }

    #[test]
    fn empty_queue_passes_check() {
        let mock = MockTransport::new().reply_no_events();
        let mut s = session(mock);
        s.check_error_queue().unwrap();
    }
}
