use log::{debug, warn};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Connection configuration for the instrument transport.
///
/// Contains timeout settings for the different phases of the connection
/// lifecycle. All timeouts have sensible defaults but can be customized for
/// slow links (a waveform block at full record length takes a while over
/// 100BASE-T, let alone GPIB bridges).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the initial connection
    pub connect_timeout: Duration,
    /// Per-read timeout while waiting for instrument responses
    pub read_timeout: Duration,
    /// Timeout for writing command bytes
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Byte-oriented transport to an already-open instrument session.
///
/// This is the narrow seam between the protocol engine and whatever carries
/// the bytes (raw TCP socket server, a VXI-11 gateway, a USBTMC bridge).
/// Session lifecycle, resource-string resolution and timeout enforcement all
/// live behind this trait; the protocol engine only writes commands and reads
/// responses. Read timeouts must surface as `io::ErrorKind::TimedOut` (or
/// `WouldBlock` on platforms that report it that way) and are never retried
/// here.
pub trait Transport: Send {
    /// Write all bytes of one command, including its terminator.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read until `terminator` is consumed, returning everything read
    /// including the terminator. On end-of-stream before the terminator the
    /// partial data is returned; the caller decides whether that is a
    /// framing error.
    fn read_until(&mut self, terminator: u8) -> io::Result<Vec<u8>>;

    /// Read exactly `count` bytes. Used for binary block payloads, where
    /// terminator-valued bytes legitimately occur inside sample data.
    fn read_exact_bytes(&mut self, count: usize) -> io::Result<Vec<u8>>;
}

/// TCP transport for instruments exposing a raw socket server (port 4000 on
/// the DPO2000 series e*Scope interface) or a socket-to-USBTMC bridge.
pub struct TcpTransport {
    stream: TcpStream,
    /// Bytes received past the last terminator, kept for the next read.
    pending: Vec<u8>,
}

impl TcpTransport {
    /// Connect to `host:port` applying the configured timeouts.
    pub fn connect(host: &str, port: u16, config: &ConnectionConfig) -> io::Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid instrument address: {host}:{port}"),
            )
        })?;

        debug!("Connecting to instrument at {addr}");
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| {
            warn!("Failed to connect to {addr}: {e}");
            e
        })?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_write_timeout(Some(config.write_timeout))?;
        stream.set_nodelay(true)?;
        debug!("Connected to instrument at {addr}");

        Ok(Self {
            stream,
            pending: Vec::new(),
        })
    }

    fn fill_pending(&mut self) -> io::Result<usize> {
        let mut buf = [0u8; 4096];
        let n = self.stream.read(&mut buf)?;
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Transport for TcpTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    fn read_until(&mut self, terminator: u8) -> io::Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == terminator) {
                let rest = self.pending.split_off(pos + 1);
                let line = std::mem::replace(&mut self.pending, rest);
                return Ok(line);
            }
            if self.fill_pending()? == 0 {
                // Stream closed mid-response; hand back what we have.
                return Ok(std::mem::take(&mut self.pending));
            }
        }
    }

    fn read_exact_bytes(&mut self, count: usize) -> io::Result<Vec<u8>> {
        while self.pending.len() < count {
            if self.fill_pending()? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed inside a counted read",
                ));
            }
        }
        let rest = self.pending.split_off(count);
        Ok(std::mem::replace(&mut self.pending, rest))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Transport;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    enum Reply {
        Data(Vec<u8>),
        Timeout,
    }

    /// Scripted transport for protocol tests: records every write and plays
    /// back a queued sequence of responses or timeouts. It also watches the
    /// single-in-flight invariant: writing while a query response is still
    /// outstanding trips `violated`.
    pub(crate) struct MockTransport {
        replies: Mutex<VecDeque<Reply>>,
        auto_reply: Option<Vec<u8>>,
        writes: Arc<Mutex<Vec<String>>>,
        outstanding: AtomicBool,
        violated: Arc<AtomicBool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                auto_reply: None,
                writes: Arc::new(Mutex::new(Vec::new())),
                outstanding: AtomicBool::new(false),
                violated: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Queue one terminated text response.
        pub fn reply_line(self, line: &str) -> Self {
            self.reply_raw(format!("{line}\n").into_bytes())
        }

        /// Queue raw bytes (binary block material, unterminated lines).
        pub fn reply_raw(self, bytes: Vec<u8>) -> Self {
            self.replies.lock().unwrap().push_back(Reply::Data(bytes));
            self
        }

        /// Queue a read timeout.
        pub fn reply_timeout(self) -> Self {
            self.replies.lock().unwrap().push_back(Reply::Timeout);
            self
        }

        /// Event-queue drain terminator: the sentinel "no events" entry.
        pub fn reply_no_events(self) -> Self {
            self.reply_line("0,\"No events to report - queue empty\"")
        }

        /// Answer every read with the same line once the script runs out.
        /// Used by the ordering test where thread interleaving makes the
        /// exact reply sequence unpredictable.
        pub fn auto_reply_line(mut self, line: &str) -> Self {
            self.auto_reply = Some(format!("{line}\n").into_bytes());
            self
        }

        /// Shared handle onto the recorded command strings.
        pub fn writes(&self) -> Arc<Mutex<Vec<String>>> {
            self.writes.clone()
        }

        /// Shared handle onto the interleaving-violation flag.
        pub fn violation_flag(&self) -> Arc<AtomicBool> {
            self.violated.clone()
        }

        fn next_reply(&mut self) -> io::Result<Vec<u8>> {
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Data(bytes)) => Ok(bytes),
                Some(Reply::Timeout) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "scripted read timeout",
                )),
                None => match &self.auto_reply {
                    Some(bytes) => Ok(bytes.clone()),
                    None => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "mock transcript exhausted",
                    )),
                },
            }
        }
    }

    impl Transport for MockTransport {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.outstanding.load(Ordering::SeqCst) {
                self.violated.store(true, Ordering::SeqCst);
            }
            let text = String::from_utf8_lossy(bytes).trim_end().to_string();
            if text.ends_with('?') {
                self.outstanding.store(true, Ordering::SeqCst);
            }
            self.writes.lock().unwrap().push(text);
            Ok(())
        }

        fn read_until(&mut self, terminator: u8) -> io::Result<Vec<u8>> {
            let reply = self.next_reply()?;
            self.outstanding.store(false, Ordering::SeqCst);
            // Scripts provide whole responses; unterminated entries model
            // a stream that closed mid-line.
            let _ = terminator;
            Ok(reply)
        }

        fn read_exact_bytes(&mut self, count: usize) -> io::Result<Vec<u8>> {
            let reply = self.next_reply()?;
            if reply.len() < count {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "scripted short read",
                ));
            }
            if reply.len() > count {
                // Push the remainder back for the next counted read.
                let (now, rest) = reply.split_at(count);
                self.replies
                    .lock()
                    .unwrap()
                    .push_front(Reply::Data(rest.to_vec()));
                self.outstanding.store(false, Ordering::SeqCst);
                return Ok(now.to_vec());
            }
            self.outstanding.store(false, Ordering::SeqCst);
            Ok(reply)
        }
    }
}
