//! Byte stream driver
//!
//! Opens TCP or TLS connections to a target and moves raw bytes across them
//! under an explicit [`PacingPolicy`]. Nothing here retries: every transport
//! condition (refusal, reset, close, deadline) is reported to the caller,
//! which decides whether it is the outcome the scenario was looking for.
//!
//! # Architecture
//!
//! - [`SessionOps`] abstracts the transport (plain TCP or OpenSSL stream)
//! - [`Connection`] owns one session plus the bytes that arrived while a
//!   paced send was still in progress
//! - Readiness is always polled before a read so deadlines are honoured
//!   without touching socket timeouts
//!
//! # Examples
//!
//! ```no_run
//! use vharness::net::{Connection, PacingPolicy, Target};
//! use std::time::Duration;
//!
//! let target = Target::plain("127.0.0.1", 8080);
//! let mut conn = Connection::open(&target, Duration::from_secs(5))?;
//! conn.send(
//!     b"GET / HTTP/1.1\r\n",
//!     &PacingPolicy::PerByte(Duration::from_millis(500)),
//!     Duration::from_secs(30),
//! )?;
//! let bytes = conn.recv(4096, Duration::from_secs(15))?;
//! println!("{} bytes, closed={}", bytes.len(), bytes.is_empty());
//! # Ok::<(), vharness::net::Error>(())
//! ```

pub mod pacing;
pub mod session;
pub mod tls;

pub use pacing::PacingPolicy;
pub use session::{FdSessionOps, PollEvents, SessionOps};
pub use tls::{TlsConfig, TlsError, TlsSessionOps};

use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

/// Most response bytes kept aside while a paced send is in progress.
pub const MAX_PENDING: usize = 1024 * 1024;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Refused, unreachable, or the handshake never completed.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection reset by peer")]
    PeerReset,

    #[error("Connection closed by peer after {bytes_sent} bytes sent")]
    PeerClosed { bytes_sent: usize },

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Transport conditions that end the connection from the peer's side.
    pub fn is_peer_termination(&self) -> bool {
        matches!(self, Error::PeerReset | Error::PeerClosed { .. })
    }
}

fn is_reset(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

fn is_closed(err: &io::Error) -> bool {
    is_reset(err)
        || matches!(
            err.kind(),
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof | io::ErrorKind::NotConnected
        )
}

/// Where to connect.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

impl Target {
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Target {
            host: host.into(),
            port,
            tls: None,
        }
    }

    pub fn tls(host: impl Into<String>, port: u16, config: TlsConfig) -> Self {
        Target {
            host: host.into(),
            port,
            tls: Some(config),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls.is_some() { "tls" } else { "tcp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Outcome of a completed send.
#[derive(Debug, Clone, Copy)]
pub struct SendReport {
    pub bytes_sent: usize,
    /// When the first byte went out.
    pub started_at: Instant,
    pub elapsed: Duration,
}

/// An open transport to the server under test.
pub struct Connection {
    session: Box<dyn SessionOps>,
    peer: SocketAddr,
    alpn: Option<Vec<u8>>,
    /// Bytes read while a paced send was in progress.
    pending: Vec<u8>,
    eof: bool,
    /// A write failed because the peer went away; its response may still be readable.
    write_closed: bool,
    received: usize,
    opened_at: Instant,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("alpn", &self.alpn.as_deref().map(String::from_utf8_lossy))
            .field("pending", &self.pending.len())
            .field("eof", &self.eof)
            .field("write_closed", &self.write_closed)
            .finish()
    }
}

impl Connection {
    /// Connect to `target`, performing the TLS handshake when configured.
    pub fn open(target: &Target, timeout: Duration) -> Result<Connection> {
        let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| Error::Connection(format!("cannot resolve {}: {}", target, e)))?
            .collect();

        let mut last_err = None;
        let mut connected = None;
        for addr in addrs {
            match connect_socket(addr, timeout) {
                Ok(stream) => {
                    connected = Some((stream, addr));
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let (stream, peer) = connected.ok_or_else(|| {
            let reason = last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses".to_string());
            Error::Connection(format!("{}: {}", target, reason))
        })?;

        let session: Box<dyn SessionOps> = match &target.tls {
            Some(config) => {
                // Bound the handshake, then hand deadlines back to poll().
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                let tls = config
                    .connect(stream)
                    .map_err(|e| Error::Connection(format!("{}: {}", target, e)))?;
                tls.get_ref().set_read_timeout(None)?;
                tls.get_ref().set_write_timeout(None)?;
                Box::new(tls)
            }
            None => Box::new(FdSessionOps::new(stream)),
        };

        let alpn = session.alpn();
        tracing::debug!(%target, %peer, alpn = ?alpn.as_deref().map(String::from_utf8_lossy), "connection open");

        Ok(Connection {
            session,
            peer,
            alpn,
            pending: Vec::new(),
            eof: false,
            write_closed: false,
            received: 0,
            opened_at: Instant::now(),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Negotiated ALPN protocol, `None` for plain TCP.
    pub fn alpn(&self) -> Option<&[u8]> {
        self.alpn.as_deref()
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Write `bytes` following `pacing`, giving up once `deadline` elapses.
    ///
    /// Under a paced policy the socket is checked for readability after each
    /// segment. Response bytes found there are kept for the next `recv`; an
    /// end-of-stream ends the send with `PeerClosed`.
    pub fn send(&mut self, bytes: &[u8], pacing: &PacingPolicy, deadline: Duration) -> Result<SendReport> {
        if self.write_closed {
            return Err(Error::PeerClosed { bytes_sent: 0 });
        }
        let started_at = Instant::now();
        let limit = started_at + deadline;
        let segments = pacing.segments(bytes.len());
        let last = segments.len().saturating_sub(1);
        let mut sent = 0;

        for (idx, range) in segments.into_iter().enumerate() {
            self.write_segment(&bytes[range.clone()], limit, sent)?;
            sent = range.end;
            tracing::trace!(peer = %self.peer, sent, total = bytes.len(), "segment written");

            if pacing.is_paced() {
                self.drain_readable(sent)?;
            }

            if idx < last && !pacing.delay().is_zero() {
                let now = Instant::now();
                if now + pacing.delay() > limit {
                    thread::sleep(limit.saturating_duration_since(now));
                    return Err(Error::Timeout);
                }
                thread::sleep(pacing.delay());
            }
        }

        Ok(SendReport {
            bytes_sent: sent,
            started_at,
            elapsed: started_at.elapsed(),
        })
    }

    fn write_segment(&mut self, mut buf: &[u8], limit: Instant, already_sent: usize) -> Result<()> {
        let mut written = 0;
        while !buf.is_empty() {
            let remaining = limit.saturating_duration_since(Instant::now());
            if !self.session.poll(PollEvents::Write, Some(remaining))? {
                return Err(Error::Timeout);
            }
            match self.session.write(buf) {
                Ok(0) => {
                    return Err(Error::PeerClosed {
                        bytes_sent: already_sent + written,
                    })
                }
                Ok(n) => {
                    written += n;
                    buf = &buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) if is_closed(&e) => {
                    self.write_closed = true;
                    tracing::debug!(peer = %self.peer, error = %e, "peer stopped reading during send");
                    return Err(Error::PeerClosed {
                        bytes_sent: already_sent + written,
                    });
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    /// Pull whatever is readable right now into `pending`.
    fn drain_readable(&mut self, bytes_sent: usize) -> Result<()> {
        let mut buf = [0u8; 8192];
        while self.pending.len() < MAX_PENDING && self.session.poll(PollEvents::Read, Some(Duration::ZERO))? {
            let room = (MAX_PENDING - self.pending.len()).min(buf.len());
            match self.session.read(&mut buf[..room]) {
                Ok(0) => {
                    self.eof = true;
                    tracing::debug!(peer = %self.peer, bytes_sent, "peer closed during send");
                    return Err(Error::PeerClosed { bytes_sent });
                }
                Ok(n) => {
                    self.received += n;
                    self.pending.extend_from_slice(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if is_closed(&e) => {
                    self.eof = true;
                    return Err(Error::PeerClosed { bytes_sent });
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    /// Read up to `max_bytes`, waiting at most `deadline`.
    ///
    /// Returns an empty vector once the peer has closed gracefully.
    pub fn recv(&mut self, max_bytes: usize, deadline: Duration) -> Result<Vec<u8>> {
        if let Some(bytes) = self.take_pending(max_bytes) {
            return Ok(bytes);
        }
        if self.eof {
            return Ok(Vec::new());
        }

        let limit = Instant::now() + deadline;
        loop {
            let remaining = limit.saturating_duration_since(Instant::now());
            if !self.session.poll(PollEvents::Read, Some(remaining))? {
                return Err(Error::Timeout);
            }
            match self.read_once(max_bytes) {
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    // TLS record not complete yet.
                    if Instant::now() >= limit {
                        return Err(Error::Timeout);
                    }
                }
                other => return other,
            }
        }
    }

    /// Non-blocking read. `None` when nothing is available yet.
    pub fn try_recv(&mut self, max_bytes: usize) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.take_pending(max_bytes) {
            return Ok(Some(bytes));
        }
        if self.eof {
            return Ok(Some(Vec::new()));
        }
        if !self.session.poll(PollEvents::Read, Some(Duration::ZERO))? {
            return Ok(None);
        }
        match self.read_once(max_bytes) {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            other => other.map(Some),
        }
    }

    fn take_pending(&mut self, max_bytes: usize) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let n = max_bytes.min(self.pending.len());
        Some(self.pending.drain(..n).collect())
    }

    fn read_once(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_bytes.max(1)];
        loop {
            match self.session.read(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(Vec::new());
                }
                Ok(n) => {
                    self.received += n;
                    buf.truncate(n);
                    tracing::trace!(peer = %self.peer, n, "bytes received");
                    return Ok(buf);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_reset(&e) => {
                    self.eof = true;
                    // The reset answers our unread upload; what came before it is the response.
                    if self.write_closed && self.received > 0 {
                        return Ok(Vec::new());
                    }
                    return Err(Error::PeerReset);
                }
                Err(e) if is_closed(&e) => {
                    self.eof = true;
                    return Ok(Vec::new());
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Whether an end-of-stream has already been observed.
    pub fn is_closed_by_peer(&self) -> bool {
        self.eof && self.pending.is_empty()
    }

    /// Whether a write failed because the peer closed or reset.
    pub fn write_closed(&self) -> bool {
        self.write_closed
    }

    pub fn close(mut self) {
        if let Err(e) = self.session.close() {
            tracing::trace!(peer = %self.peer, error = %e, "close failed");
        }
    }
}

fn connect_socket(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&addr.into(), timeout)?;
    socket.set_nodelay(true)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_open_refused_is_connection_error() {
        let (listener, port) = listener();
        drop(listener);

        let err = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "got {:?}", err);
    }

    #[test]
    fn test_send_immediate_and_recv() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"world").unwrap();
            buf
        });

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let report = conn
            .send(b"hello", &PacingPolicy::Immediate, Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.bytes_sent, 5);

        let got = conn.recv(1024, Duration::from_secs(2)).unwrap();
        assert_eq!(got, b"world");
        assert_eq!(&server.join().unwrap(), b"hello");

        assert!(conn.recv(1024, Duration::from_secs(2)).unwrap().is_empty());
        assert!(conn.is_closed_by_peer());
    }

    #[test]
    fn test_per_byte_pacing_takes_time() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).unwrap();
            buf
        });

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let pacing = PacingPolicy::PerByte(Duration::from_millis(20));
        let report = conn.send(b"abcd", &pacing, Duration::from_secs(5)).unwrap();
        assert!(report.elapsed >= Duration::from_millis(60));
        conn.close();

        assert_eq!(server.join().unwrap(), b"abcd");
    }

    #[test]
    fn test_recv_timeout() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let err = conn.recv(16, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
        server.join().unwrap();
    }

    #[test]
    fn test_paced_send_reports_peer_close() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"HTTP/1.1 408 Request Timeout\r\n\r\n").unwrap();
            stream.shutdown(std::net::Shutdown::Write).unwrap();
            // Keep reading so the close stays graceful.
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
        });

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let pacing = PacingPolicy::PerByte(Duration::from_millis(50));
        let err = conn
            .send(b"GET / HTTP/1.1\r\n", &pacing, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, Error::PeerClosed { bytes_sent } if bytes_sent < 16), "got {:?}", err);

        // The response that preceded the close is still readable.
        let got = conn.recv(1024, Duration::from_secs(1)).unwrap();
        assert!(got.starts_with(b"HTTP/1.1 408"));
        assert!(conn.recv(1024, Duration::from_secs(1)).unwrap().is_empty());

        conn.close();
        server.join().unwrap();
    }

    fn read_head(stream: &mut TcpStream) {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).unwrap();
            head.push(byte[0]);
        }
    }

    #[test]
    fn test_response_survives_rejected_upload() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_head(&mut stream);
            stream
                .write_all(b"HTTP/1.1 413 Payload Too Large\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            // Dropped with the body unread, so the kernel answers with a reset.
        });

        let mut request = b"POST /test HTTP/1.1\r\nHost: localhost\r\nContent-Length: 33554432\r\n\r\n".to_vec();
        request.resize(request.len() + 32 * 1024 * 1024, b'A');

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let err = conn
            .send(&request, &PacingPolicy::Immediate, Duration::from_secs(10))
            .unwrap_err();
        assert!(matches!(err, Error::PeerClosed { bytes_sent } if bytes_sent < request.len()), "got {:?}", err);
        assert!(conn.write_closed());
        server.join().unwrap();

        let got = conn.recv(1024, Duration::from_secs(2)).unwrap();
        assert!(got.starts_with(b"HTTP/1.1 413"), "got {:?}", String::from_utf8_lossy(&got));
        assert!(conn.recv(1024, Duration::from_secs(2)).unwrap().is_empty());
        assert!(matches!(
            conn.send(b"more", &PacingPolicy::Immediate, Duration::from_secs(1)),
            Err(Error::PeerClosed { bytes_sent: 0 })
        ));
    }

    #[test]
    fn test_paced_send_bounds_buffered_response() {
        const RESPONSE: usize = 3 * MAX_PENDING;
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&vec![b'x'; RESPONSE]).unwrap();
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
            rest
        });

        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        thread::sleep(Duration::from_millis(100));
        let pacing = PacingPolicy::PerByte(Duration::from_millis(20));
        conn.send(b"abcd", &pacing, Duration::from_secs(5)).unwrap();
        assert!(conn.pending.len() <= MAX_PENDING, "{} bytes buffered", conn.pending.len());

        // Nothing past the cap was dropped; it is still in the socket.
        let mut total = 0;
        while total < RESPONSE {
            total += conn.recv(64 * 1024, Duration::from_secs(2)).unwrap().len();
        }
        assert_eq!(total, RESPONSE);
        conn.close();
        assert_eq!(server.join().unwrap(), b"abcd");
    }

    #[test]
    fn test_try_recv_without_data() {
        let (listener, port) = listener();
        let mut conn = Connection::open(&Target::plain("127.0.0.1", port), Duration::from_secs(1)).unwrap();
        let (_server, _) = listener.accept().unwrap();
        assert!(conn.try_recv(16).unwrap().is_none());
    }
}
