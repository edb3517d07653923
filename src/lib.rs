//! vharness - protocol compliance and attack simulation for HTTP servers
//!
//! The harness drives a running HTTP/1.1 and HTTP/2 server with crafted
//! traffic (smuggling payloads, oversized headers, trickled bytes, rapid
//! stream resets, HPACK bombs) and judges each scenario PASS, FAIL or
//! INCONCLUSIVE.
//!
//! - [`net`]: connections, byte pacing and TLS
//! - [`http`]: raw request construction and incremental response parsing
//! - [`http::h2`]: a minimal sans-I/O HTTP/2 client
//! - [`scenario`]: declarative scenarios and the runner
//! - [`suites`]: the built-in scenario catalogue
//! - [`server`]: starting and stopping the server under test

pub mod config;
pub mod http;
pub mod net;
pub mod scenario;
pub mod server;
pub mod suites;
