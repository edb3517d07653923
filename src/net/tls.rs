//! TLS transport
//!
//! `TlsConfig` is built once per target and reused for every connection the
//! runner opens against it. Client configurations never verify the peer by
//! default: servers under test normally present self-signed certificates.
//!
//! A server-side builder with an in-memory self-signed certificate exists so
//! TLS and ALPN behaviour can be exercised against local listeners.
//!
//! ```no_run
//! use vharness::net::tls::TlsConfig;
//! use std::net::TcpStream;
//!
//! let config = TlsConfig::client()?
//!     .servername("localhost")
//!     .alpn(&["h2"])?
//!     .build();
//! let tcp = TcpStream::connect("127.0.0.1:8443")?;
//! let session = config.connect(tcp)?;
//! assert_eq!(session.selected_alpn().as_deref(), Some(&b"h2"[..]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::session::{poll_fd, PollEvents, SessionOps};
use super::Result as NetResult;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{
    AlpnError, Ssl, SslContext, SslContextBuilder, SslMethod, SslStream,
    SslVerifyMode, SslVersion,
};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// Parse a version name (case-insensitive, `TLSv1.2` / `1.3` forms).
    pub fn parse(s: &str) -> Result<Self, TlsError> {
        match s.to_ascii_uppercase().trim_start_matches("TLS").trim_start_matches('V') {
            "1.2" => Ok(TlsVersion::Tls12),
            "1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    fn to_openssl(self) -> SslVersion {
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    ctx: SslContext,
    is_server: bool,
    servername: Option<String>,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("is_server", &self.is_server)
            .field("servername", &self.servername)
            .finish()
    }
}

impl TlsConfig {
    pub fn client() -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new()
    }

    pub fn server() -> Result<ServerConfigBuilder, TlsError> {
        ServerConfigBuilder::new()
    }

    /// Client handshake over an established TCP stream.
    pub fn connect(&self, stream: TcpStream) -> Result<TlsSessionOps, TlsError> {
        if self.is_server {
            return Err(TlsError::InvalidConfig(
                "cannot use server config for client connection".to_string(),
            ));
        }

        let mut ssl = Ssl::new(&self.ctx)?;
        if let Some(ref name) = self.servername {
            ssl.set_hostname(name)?;
        }

        let stream = ssl
            .connect(stream)
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        tracing::debug!(
            version = stream.ssl().version_str(),
            alpn = ?stream.ssl().selected_alpn_protocol().map(String::from_utf8_lossy),
            "TLS handshake complete"
        );

        Ok(TlsSessionOps { stream, failed: false })
    }

    /// Server handshake over an accepted TCP stream.
    pub fn accept(&self, stream: TcpStream) -> Result<TlsSessionOps, TlsError> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig(
                "cannot use client config for server accept".to_string(),
            ));
        }

        let ssl = Ssl::new(&self.ctx)?;
        let stream = ssl
            .accept(stream)
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        Ok(TlsSessionOps { stream, failed: false })
    }
}

/// Encode protocol names in ALPN wire format (length-prefixed).
fn alpn_wire(protocols: &[&str]) -> Result<Vec<u8>, TlsError> {
    let mut wire = Vec::new();
    for proto in protocols {
        let len = u8::try_from(proto.len())
            .map_err(|_| TlsError::InvalidConfig(format!("ALPN protocol too long: {}", proto)))?;
        wire.push(len);
        wire.extend_from_slice(proto.as_bytes());
    }
    Ok(wire)
}

/// First of our `preferred` protocols that the client offered, as a slice
/// of the client's wire-format list.
fn select_alpn<'a>(preferred: &[Vec<u8>], client: &'a [u8]) -> Option<&'a [u8]> {
    let mut offered = Vec::new();
    let mut pos = 0;
    while pos < client.len() {
        let len = client[pos] as usize;
        pos += 1;
        if pos + len > client.len() {
            break;
        }
        offered.push(&client[pos..pos + len]);
        pos += len;
    }
    preferred
        .iter()
        .find_map(|proto| offered.iter().copied().find(|o| *o == proto.as_slice()))
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    servername: Option<String>,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;
        ctx_builder.set_verify(SslVerifyMode::NONE);

        Ok(ClientConfigBuilder {
            ctx_builder,
            servername: None,
        })
    }

    /// Pin both the minimum and maximum protocol version.
    pub fn version(mut self, version: TlsVersion) -> Result<Self, TlsError> {
        self.ctx_builder.set_min_proto_version(Some(version.to_openssl()))?;
        self.ctx_builder.set_max_proto_version(Some(version.to_openssl()))?;
        Ok(self)
    }

    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        let wire = alpn_wire(protocols)?;
        self.ctx_builder.set_alpn_protos(&wire)?;
        Ok(self)
    }

    /// SNI server name
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.ctx_builder.set_verify(if verify {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });
        self
    }

    pub fn build(self) -> TlsConfig {
        TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: false,
            servername: self.servername,
        }
    }
}

/// Server configuration builder
pub struct ServerConfigBuilder {
    ctx_builder: SslContextBuilder,
    has_cert: bool,
}

impl ServerConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        Ok(ServerConfigBuilder {
            ctx_builder: SslContextBuilder::new(SslMethod::tls_server())?,
            has_cert: false,
        })
    }

    /// Protocols the server is willing to select, in preference order.
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self, TlsError> {
        // Rejects names longer than 255 bytes.
        alpn_wire(protocols)?;
        let server_protos: Vec<Vec<u8>> = protocols.iter().map(|p| p.as_bytes().to_vec()).collect();
        self.ctx_builder.set_alpn_select_callback(move |_ssl, client_protos| {
            select_alpn(&server_protos, client_protos).ok_or(AlpnError::NOACK)
        });
        Ok(self)
    }

    /// Install a freshly generated self-signed certificate for `common_name`.
    pub fn self_signed(mut self, common_name: &str) -> Result<Self, TlsError> {
        let (cert, key) = generate_self_signed(common_name)?;
        self.ctx_builder.set_certificate(&cert)?;
        self.ctx_builder.set_private_key(&key)?;
        self.has_cert = true;
        Ok(self)
    }

    pub fn build(mut self) -> Result<TlsConfig, TlsError> {
        if !self.has_cert {
            self = self.self_signed("localhost")?;
        }

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: true,
            servername: None,
        })
    }
}

fn generate_self_signed(common_name: &str) -> Result<(X509, PKey<Private>), TlsError> {
    let key = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("CN", common_name)?;
    let name = name.build();

    let serial = {
        let mut bn = BigNum::new()?;
        bn.rand(64, MsbOption::MAYBE_ZERO, false)?;
        bn.to_asn1_integer()?
    };

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(7)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.sign(&key, MessageDigest::sha256())?;

    Ok((builder.build(), key))
}

/// TLS session operations
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSessionOps {
    pub fn selected_alpn(&self) -> Option<Vec<u8>> {
        self.stream.ssl().selected_alpn_protocol().map(<[u8]>::to_vec)
    }

    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> NetResult<bool> {
        // Decrypted bytes already buffered inside OpenSSL never show up on the fd.
        if events == PollEvents::Read && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }
        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).inspect_err(|_| self.failed = true)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.stream.write(buf).inspect_err(|_| self.failed = true)?;
        self.stream.flush()?;
        Ok(n)
    }

    fn close(&mut self) -> NetResult<()> {
        if !self.failed {
            let _ = self.stream.shutdown();
        }
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    fn alpn(&self) -> Option<Vec<u8>> {
        self.selected_alpn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_version_parse() {
        assert_eq!(TlsVersion::parse("TLSv1.2").unwrap(), TlsVersion::Tls12);
        assert_eq!(TlsVersion::parse("tls1.3").unwrap(), TlsVersion::Tls13);
        assert_eq!(TlsVersion::parse("1.3").unwrap(), TlsVersion::Tls13);
        assert!(TlsVersion::parse("SSLv3").is_err());
    }

    #[test]
    fn test_alpn_wire_format() {
        assert_eq!(alpn_wire(&["h2", "http/1.1"]).unwrap(), b"\x02h2\x08http/1.1");
        let long = "x".repeat(300);
        assert!(alpn_wire(&[long.as_str()]).is_err());
    }

    #[test]
    fn test_select_alpn_prefers_server_order() {
        let ours = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        assert_eq!(select_alpn(&ours, b"\x08http/1.1\x02h2"), Some(&b"h2"[..]));
        assert_eq!(select_alpn(&ours, b"\x08http/1.1"), Some(&b"http/1.1"[..]));
        assert_eq!(select_alpn(&ours, b"\x06spdy/3"), None);
        assert_eq!(select_alpn(&ours, b"\x09h2"), None);
    }

    #[test]
    fn test_client_config_rejects_accept() {
        let config = TlsConfig::client().unwrap().build();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        let (stream, _) = listener.accept().unwrap();
        assert!(matches!(config.accept(stream), Err(TlsError::InvalidConfig(_))));
    }

    #[test]
    fn test_handshake_negotiates_h2() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_config = TlsConfig::server()
            .unwrap()
            .alpn(&["h2", "http/1.1"])
            .unwrap()
            .build()
            .unwrap();

        let server = thread::spawn(move || {
            let (tcp, _) = listener.accept().unwrap();
            let mut session = server_config.accept(tcp).unwrap();
            let mut buf = [0u8; 4];
            session.stream.read_exact(&mut buf).unwrap();
            session.write(&buf).unwrap();
            session.selected_alpn()
        });

        let client_config = TlsConfig::client()
            .unwrap()
            .servername("localhost")
            .alpn(&["h2"])
            .unwrap()
            .build();
        let mut session = client_config.connect(TcpStream::connect(addr).unwrap()).unwrap();
        assert_eq!(session.alpn().as_deref(), Some(&b"h2"[..]));

        session.write(b"ping").unwrap();
        assert!(session.poll(PollEvents::Read, Some(Duration::from_secs(2))).unwrap());
        let mut buf = [0u8; 4];
        session.stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        assert_eq!(server.join().unwrap().as_deref(), Some(&b"h2"[..]));
    }
}
