//! Minimal HTTP/2 client for frame-level probes
//!
//! Only what attack and compliance scenarios need is implemented: the
//! connection preface, SETTINGS exchange, HEADERS/CONTINUATION with HPACK,
//! DATA, RST_STREAM, PING and GOAWAY. The client is sans-I/O; the scenario
//! runner moves its outbound bytes over a [`Connection`](crate::net::Connection)
//! and feeds received bytes back in.
//!
//! # Examples
//!
//! ```
//! use vharness::http::h2::{request_headers, ErrorCode, Http2Event, Http2FrameClient};
//!
//! let mut client = Http2FrameClient::new();
//! client.initiate().unwrap();
//! let preface = client.take_outbound();
//! assert!(preface.starts_with(b"PRI * HTTP/2.0"));
//!
//! // Server SETTINGS with no parameters.
//! let events = client.on_bytes(&[0, 0, 0, 0x4, 0, 0, 0, 0, 0]);
//! assert!(matches!(events[0], Http2Event::SettingsReceived(_)));
//!
//! let id = client
//!     .open_stream(&request_headers("GET", "https", "localhost", "/"), true)
//!     .unwrap();
//! client.reset_stream(id, ErrorCode::Cancel).unwrap();
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod frames;
pub mod hpack;
pub mod settings;

pub use client::{request_headers, ClientState, Http2Event, Http2FrameClient};
pub use error::{Error, ErrorCode, Result};
pub use frames::{Frame, FrameFlags, FrameHeader, FrameType, RawFrame};
pub use settings::{SettingsMap, SettingsParameter};

/// Client connection preface (RFC 7540 Section 3.5)
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// ALPN protocol identifier for HTTP/2 over TLS
pub const ALPN_H2: &[u8] = b"h2";

/// Maximum stream ID value (2^31 - 1)
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;
