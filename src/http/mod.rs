//! HTTP message construction and response parsing
//!
//! Requests are built as raw bytes by [`RequestBuilder`] and the attack
//! builders in [`request`], so that malformed framing reaches the server
//! exactly as written. Responses are reconstructed incrementally by
//! [`Http1ResponseReader`]; framing problems in a response are reported as
//! reader states, not as errors.
//!
//! # Examples
//!
//! ```
//! use vharness::http::{Http1ResponseReader, ReaderState, RequestBuilder};
//!
//! let request = RequestBuilder::get("/index.html")
//!     .header("Connection", "close")
//!     .build();
//! assert!(request.bytes.starts_with(b"GET /index.html HTTP/1.1\r\n"));
//!
//! let mut reader = Http1ResponseReader::new();
//! match reader.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok") {
//!     ReaderState::Complete(response) => assert_eq!(response.body(), b"ok"),
//!     other => panic!("unexpected state {:?}", other),
//! }
//! ```

pub mod chunked;
pub mod framing;
pub mod h2;
pub mod headers;
pub mod message;
pub mod reader;
pub mod request;
pub mod traversal;

pub use framing::FramingAnalysis;
pub use headers::Headers;
pub use message::{Framing, HttpResponse, Method, ResponseHead, Version};
pub use reader::{Http1ResponseReader, ReaderState};
pub use request::{Probe, RawRequest, RequestBuilder};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP parsing errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Protocol error: {0}")]
    Protocol(String),
}
