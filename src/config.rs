//! Harness parameters
//!
//! There is no configuration file. Every limit a scenario probes lives in
//! [`Thresholds`], and where to find the server lives in [`HarnessConfig`].
//! Both carry defaults matching a stock server configuration; the binary
//! overrides individual values from its command line.

use crate::net::tls::{TlsConfig, TlsError};
use crate::net::Target;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Server limits and timing windows that scenarios assert against.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Longest accepted single header line, in bytes.
    pub header_line_limit: usize,
    /// Largest accepted header block, in bytes.
    pub header_block_limit: usize,
    pub header_count_limit: usize,
    /// Largest accepted request body.
    pub body_limit: u64,
    /// Largest accepted upload (PUT).
    pub upload_limit: u64,
    pub chunk_limit: usize,
    /// Time the server allows for a complete request head.
    pub header_timeout: Duration,
    /// Time the server allows for writing a response.
    pub write_timeout: Duration,
    /// Resets after which the server is expected to terminate the connection.
    pub rapid_reset_threshold: u32,
    /// Extra resets tolerated beyond the threshold before it counts as late.
    pub rapid_reset_slack: u32,
    pub rapid_reset_attempts: u32,
    pub hpack_table_limit: u32,
    pub hpack_list_limit: u32,
    /// Largest relative latency difference still reported as PASS.
    pub timing_variance_pct: f64,
    pub timing_samples: usize,
    pub slowloris_delay: Duration,
    /// Tolerance around `header_timeout` for close-timing checks.
    pub slowloris_grace: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            header_line_limit: 8192,
            header_block_limit: 8192,
            header_count_limit: 100,
            body_limit: 10 * MIB,
            upload_limit: 100 * MIB,
            chunk_limit: MIB as usize,
            header_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(60),
            rapid_reset_threshold: 100,
            rapid_reset_slack: 10,
            rapid_reset_attempts: 150,
            hpack_table_limit: 4096,
            hpack_list_limit: 16384,
            timing_variance_pct: 10.0,
            timing_samples: 10,
            slowloris_delay: Duration::from_millis(500),
            slowloris_grace: Duration::from_secs(2),
        }
    }
}

impl Thresholds {
    /// Last reset at which a connection termination still counts as on time.
    pub fn rapid_reset_pass_boundary(&self) -> u32 {
        self.rapid_reset_threshold + self.rapid_reset_slack
    }

    /// Window in which a slow client must be disconnected.
    pub fn slowloris_window(&self) -> (Duration, Duration) {
        (
            self.header_timeout.saturating_sub(self.slowloris_grace),
            self.header_timeout + self.slowloris_grace,
        )
    }
}

/// Where the server under test listens, and how long to wait for it.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub host: String,
    pub port: u16,
    pub tls_port: u16,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Existing resource used by probes that need a 200.
    pub resource: String,
    pub thresholds: Thresholds,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tls_port: 8443,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            resource: "/index.html".to_string(),
            thresholds: Thresholds::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        HarnessConfig {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn tls_port(mut self, port: u16) -> Self {
        self.tls_port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn resource(mut self, path: impl Into<String>) -> Self {
        self.resource = path.into();
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn plain_target(&self) -> Target {
        Target::plain(self.host.clone(), self.port)
    }

    /// TLS target offering `alpn`. Certificates are not verified; the
    /// harness probes protocol behaviour, not the certificate chain.
    pub fn tls_target(&self, alpn: &[&str]) -> Result<Target, TlsError> {
        let mut builder = TlsConfig::client()?.verify_peer(false);
        if !alpn.is_empty() {
            builder = builder.alpn(alpn)?;
        }
        if self.host.parse::<std::net::IpAddr>().is_err() {
            builder = builder.servername(self.host.clone());
        }
        Ok(Target::tls(self.host.clone(), self.tls_port, builder.build()))
    }

    /// `Host` header value for requests to the plain port.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
