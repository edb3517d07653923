//! Raw request construction
//!
//! Requests are assembled as bytes rather than as typed messages so that
//! malformed input (duplicate framing headers, oversized lines, broken chunk
//! sizes) can be expressed exactly as it will appear on the wire. Every
//! request carries a [`Probe`] naming the protocol rule it exercises.

use super::chunked::{encode_chunked_body, push_chunk, push_last_chunk};
use super::framing::{self, FramingAnalysis};
use super::message::{Method, Version};
use super::Headers;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Protocol rule exercised by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub rule: String,
    pub description: String,
}

impl Probe {
    pub fn new(rule: impl Into<String>, description: impl Into<String>) -> Self {
        Probe {
            rule: rule.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rule.is_empty() {
            f.write_str(&self.description)
        } else {
            write!(f, "{} ({})", self.description, self.rule)
        }
    }
}

/// Request bytes ready to hand to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub bytes: Vec<u8>,
    pub method: String,
    pub probe: Probe,
}

impl RawRequest {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes up to and including the blank line, or everything if the head
    /// is never terminated.
    pub fn head(&self) -> &[u8] {
        match self.bytes.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(idx) => &self.bytes[..idx + 4],
            None => &self.bytes,
        }
    }

    /// Header fields as a server would parse them. Lines that do not parse
    /// as fields are skipped.
    pub fn headers(&self) -> Headers {
        let head = String::from_utf8_lossy(self.head());
        head.split("\r\n")
            .skip(1)
            .filter(|line| !line.is_empty())
            .filter_map(|line| Headers::parse_header_line(line).ok())
            .collect()
    }

    /// Framing the request declares, classified like a response would be.
    pub fn framing(&self) -> FramingAnalysis {
        framing::analyze(&self.headers())
    }

    pub fn body(&self) -> &[u8] {
        &self.bytes[self.head().len()..]
    }
}

enum Body {
    None,
    /// Content-Length added unless the caller set framing headers.
    Sized(Vec<u8>),
    /// Appended verbatim with no framing header.
    Raw(Vec<u8>),
}

/// Builder for well-formed and deliberately malformed requests.
pub struct RequestBuilder {
    method: String,
    target: String,
    version: String,
    host: Option<String>,
    lines: Vec<String>,
    body: Body,
    terminate_head: bool,
    probe: Probe,
}

impl RequestBuilder {
    /// Start a request. `method` may be any token, including ones no server
    /// implements.
    pub fn new(method: impl fmt::Display, target: impl Into<String>) -> Self {
        RequestBuilder {
            method: method.to_string(),
            target: target.into(),
            version: Version::Http11.to_string(),
            host: Some("localhost".to_string()),
            lines: Vec::new(),
            body: Body::None,
            terminate_head: true,
            probe: Probe::default(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    /// Protocol version token written on the request line.
    pub fn version(mut self, version: impl fmt::Display) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn omit_host(mut self) -> Self {
        self.host = None;
        self
    }

    /// Append a header field. Repeated names are kept as separate lines.
    pub fn header(mut self, name: impl fmt::Display, value: impl fmt::Display) -> Self {
        self.lines.push(format!("{}: {}", name, value));
        self
    }

    /// Append a header line exactly as given.
    pub fn raw_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Body with a matching `Content-Length`, unless framing headers were
    /// already set explicitly.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Sized(body.into());
        self
    }

    /// Body bytes written after the head without any framing header.
    pub fn raw_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body::Raw(body.into());
        self
    }

    pub fn chunked_body(self, data: &[u8], chunk_size: usize) -> Self {
        self.header("Transfer-Encoding", "chunked")
            .raw_body(encode_chunked_body(data, chunk_size))
    }

    /// Leave the header block open (no blank line), for trickle attacks.
    pub fn unterminated(mut self) -> Self {
        self.terminate_head = false;
        self
    }

    pub fn probe(mut self, rule: impl Into<String>, description: impl Into<String>) -> Self {
        self.probe = Probe::new(rule, description);
        self
    }

    pub fn build(self) -> RawRequest {
        let mut head = format!("{} {} {}\r\n", self.method, self.target, self.version);
        if let Some(host) = &self.host {
            head.push_str("Host: ");
            head.push_str(host);
            head.push_str("\r\n");
        }

        let explicit_framing = self.lines.iter().any(|line| {
            let name = line.split(':').next().unwrap_or("").trim();
            name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding")
        });

        for line in &self.lines {
            head.push_str(line);
            head.push_str("\r\n");
        }

        let body = match self.body {
            Body::None => Vec::new(),
            Body::Sized(body) => {
                if !explicit_framing {
                    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
                }
                body
            }
            Body::Raw(body) => body,
        };

        if self.terminate_head {
            head.push_str("\r\n");
        }

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&body);

        RawRequest {
            bytes,
            method: self.method,
            probe: self.probe,
        }
    }
}

/// Two `Content-Length` headers with different values.
pub fn duplicate_content_length(path: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .header("Content-Length", 6)
        .header("Content-Length", 5)
        .raw_body(&b"12345SMUGGLED"[..])
        .probe("RFC 7230 §3.3.2", "duplicate Content-Length with differing values")
        .build()
}

/// `Transfer-Encoding: chunked` followed by `Transfer-Encoding: identity`.
pub fn duplicate_transfer_encoding(path: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .header("Transfer-Encoding", "chunked")
        .header("Transfer-Encoding", "identity")
        .raw_body(&b"0\r\n\r\n"[..])
        .probe("RFC 7230 §3.3.1", "duplicate Transfer-Encoding headers")
        .build()
}

/// CL.TE: the length covers a smuggled suffix after the zero chunk.
pub fn cl_te(path: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .header("Content-Length", 13)
        .header("Transfer-Encoding", "chunked")
        .raw_body(&b"0\r\n\r\nSMUGGLED"[..])
        .probe("RFC 7230 §3.3.3", "Content-Length together with Transfer-Encoding (CL.TE)")
        .build()
}

/// TE.CL: the length stops inside the first chunk.
pub fn te_cl(path: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .header("Transfer-Encoding", "chunked")
        .header("Content-Length", 4)
        .raw_body(&b"5c\r\nSMUGGLED_REQUEST\r\n0\r\n\r\n"[..])
        .probe("RFC 7230 §3.3.3", "Transfer-Encoding together with Content-Length (TE.CL)")
        .build()
}

/// A single `Transfer-Encoding` header carrying `value` verbatim, with an
/// empty chunked body.
pub fn transfer_encoding_variant(path: &str, value: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .raw_line(format!("Transfer-Encoding:{}", value))
        .raw_body(&b"0\r\n\r\n"[..])
        .probe("RFC 7230 §3.3.1", format!("Transfer-Encoding value {:?}", value))
        .build()
}

/// `Transfer-Encoding: identity` next to a valid `Content-Length`.
pub fn identity_with_content_length(path: &str) -> RawRequest {
    RequestBuilder::new(Method::Post, path)
        .header("Transfer-Encoding", "identity")
        .header("Content-Length", 5)
        .raw_body(&b"12345"[..])
        .probe("RFC 7230 §3.3.1", "Transfer-Encoding identity with Content-Length")
        .build()
}

/// One header line whose value is `size` bytes long.
pub fn oversized_header_line(size: usize) -> RawRequest {
    RequestBuilder::get("/")
        .header("X-Large", "A".repeat(size))
        .probe("RFC 6585 §5", format!("{} byte header value", size))
        .build()
}

/// Many ~110 byte header lines adding up to at least `total` bytes.
pub fn oversized_header_block(total: usize) -> RawRequest {
    let value = "A".repeat(100);
    let mut builder = RequestBuilder::get("/");
    let mut written = 0;
    let mut i = 0;
    while written < total {
        let line = format!("X-Header-{}: {}", i, value);
        written += line.len() + 2;
        builder = builder.raw_line(line);
        i += 1;
    }
    builder
        .probe("RFC 6585 §5", format!("{} header lines totalling {} bytes", i, written))
        .build()
}

/// `count` small header fields besides Host.
pub fn many_headers(count: usize) -> RawRequest {
    (0..count)
        .fold(RequestBuilder::get("/"), |b, i| b.header(format!("X-H{}", i), "val"))
        .probe("RFC 6585 §5", format!("{} header fields", count))
        .build()
}

/// Headers declaring a `len` byte body that is never sent.
pub fn declared_body_without_payload(method: impl fmt::Display, len: u64) -> RawRequest {
    RequestBuilder::new(method, "/test")
        .header("Content-Length", len)
        .probe("RFC 7231 §6.5.11", format!("declared body of {} bytes", len))
        .build()
}

/// A chunk whose size line announces `declared` bytes but only `actual`
/// bytes follow before the last chunk.
pub fn oversized_chunk(declared: usize, actual: usize) -> RawRequest {
    let mut body = format!("{:x}\r\n", declared).into_bytes();
    body.resize(body.len() + actual, b'A');
    body.extend_from_slice(b"\r\n");
    push_last_chunk(&mut body);

    RequestBuilder::new(Method::Post, "/test")
        .header("Transfer-Encoding", "chunked")
        .raw_body(body)
        .probe("RFC 7230 §4.1", format!("chunk size {} bytes", declared))
        .build()
}

/// `count` chunks of `chunk_size` bytes each, terminated by the last chunk.
pub fn chunked_stream(chunk_size: usize, count: usize) -> RawRequest {
    let chunk = vec![b'A'; chunk_size];
    let mut body = Vec::with_capacity((chunk_size + 16) * count + 5);
    for _ in 0..count {
        push_chunk(&mut body, &chunk);
    }
    push_last_chunk(&mut body);

    RequestBuilder::new(Method::Post, "/test")
        .header("Transfer-Encoding", "chunked")
        .raw_body(body)
        .probe(
            "RFC 7230 §4.1",
            format!("chunked body of {} bytes", chunk_size * count),
        )
        .build()
}

/// Request with a `Range` header, e.g. `range_request(Method::Get, "/", "bytes=0-99")`.
pub fn range_request(method: impl fmt::Display, path: &str, ranges: &str) -> RawRequest {
    RequestBuilder::new(method, path)
        .header("Range", ranges)
        .probe("RFC 7233 §3.1", format!("Range {}", ranges))
        .build()
}

/// `Range` made conditional with `If-Range`.
pub fn conditional_range(path: &str, ranges: &str, if_range: &str) -> RawRequest {
    RequestBuilder::get(path)
        .header("Range", ranges)
        .header("If-Range", if_range)
        .probe("RFC 7233 §3.2", format!("Range {} If-Range {}", ranges, if_range))
        .build()
}

/// A bare request line whose header block never follows, meant to be
/// trickled byte by byte.
pub fn slow_headers(path: &str) -> RawRequest {
    RequestBuilder::get(path)
        .omit_host()
        .unterminated()
        .probe("RFC 7230 §6.5", "incomplete header block")
        .build()
}

/// `Authorization: Basic` with the given credentials.
pub fn basic_auth(path: &str, user: &str, password: &str) -> RawRequest {
    let token = STANDARD.encode(format!("{}:{}", user, password));
    RequestBuilder::get(path)
        .header("Authorization", format!("Basic {}", token))
        .probe("RFC 7617 §2", format!("Basic credentials for {:?}", user))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_get() {
        let req = RequestBuilder::get("/index.html").header("Accept", "*/*").build();
        assert_eq!(
            req.bytes,
            b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n".to_vec()
        );
        assert_eq!(req.method, "GET");
        assert_eq!(req.framing(), FramingAnalysis::Unspecified);
    }

    #[test]
    fn test_body_adds_content_length() {
        let req = RequestBuilder::new(Method::Post, "/form").body("a=1").build();
        assert!(req.bytes.ends_with(b"Content-Length: 3\r\n\r\na=1"));
        assert_eq!(req.framing(), FramingAnalysis::ContentLength(3));
        assert_eq!(req.body(), b"a=1");
    }

    #[test]
    fn test_explicit_framing_suppresses_content_length() {
        let req = RequestBuilder::new(Method::Post, "/")
            .header("Content-Length", 99)
            .body("short")
            .build();
        assert_eq!(req.headers().count("Content-Length"), 1);
    }

    #[test]
    fn test_omit_host_and_version() {
        let req = RequestBuilder::get("/")
            .omit_host()
            .version(Version::Http10)
            .build();
        assert_eq!(req.bytes, b"GET / HTTP/1.0\r\n\r\n".to_vec());

        let req = RequestBuilder::get("/").version("HTTP/2.0").build();
        assert!(req.bytes.starts_with(b"GET / HTTP/2.0\r\n"));
    }

    #[test]
    fn test_duplicate_content_length_is_conflicting() {
        let req = duplicate_content_length("/test.html");
        assert!(matches!(req.framing(), FramingAnalysis::ConflictingContentLength(_)));
        assert_eq!(req.probe.rule, "RFC 7230 §3.3.2");
        assert_eq!(req.body(), b"12345SMUGGLED");
    }

    #[test]
    fn test_smuggling_pairs_are_ambiguous() {
        assert!(matches!(cl_te("/").framing(), FramingAnalysis::Ambiguous { .. }));
        assert!(matches!(te_cl("/").framing(), FramingAnalysis::Ambiguous { .. }));
        assert!(matches!(
            identity_with_content_length("/").framing(),
            FramingAnalysis::Ambiguous { .. }
        ));
    }

    #[test]
    fn test_transfer_encoding_variants() {
        let req = duplicate_transfer_encoding("/");
        assert_eq!(req.headers().get_all("Transfer-Encoding"), vec!["chunked", "identity"]);
        assert!(matches!(req.framing(), FramingAnalysis::OtherCoding(_)));

        let req = transfer_encoding_variant("/", "  chunked  ");
        assert!(req.bytes.windows(22).any(|w| w == b"Transfer-Encoding:  ch"));
        assert_eq!(req.framing(), FramingAnalysis::Chunked);

        let req = transfer_encoding_variant("/", " chunked, identity");
        assert!(matches!(req.framing(), FramingAnalysis::OtherCoding(_)));
    }

    #[test]
    fn test_size_probes() {
        let req = oversized_header_line(9000);
        assert_eq!(req.headers().get("X-Large").map(str::len), Some(9000));

        let req = oversized_header_block(10_000);
        assert!(req.headers().wire_len() >= 10_000);
        assert!(req.headers().len() > 80);

        let req = many_headers(110);
        assert_eq!(req.headers().len(), 111);
    }

    #[test]
    fn test_declared_body_is_not_sent() {
        let req = declared_body_without_payload(Method::Put, 101 * 1024 * 1024);
        assert!(req.body().is_empty());
        assert_eq!(req.framing(), FramingAnalysis::ContentLength(101 * 1024 * 1024));
        assert_eq!(req.method, "PUT");
    }

    #[test]
    fn test_oversized_chunk_layout() {
        let req = oversized_chunk(2 * 1024 * 1024, 1000);
        let body = req.body();
        assert!(body.starts_with(b"200000\r\nAAAA"));
        assert!(body.ends_with(b"A\r\n0\r\n\r\n"));
        assert_eq!(body.len(), 8 + 1000 + 2 + 5);
    }

    #[test]
    fn test_chunked_stream_decodes() {
        let req = chunked_stream(1024, 3);
        let decoded = crate::http::chunked::decode_chunked_body(req.body()).unwrap();
        assert_eq!(decoded.len(), 3072);
    }

    #[test]
    fn test_range_builders() {
        let req = range_request(Method::Head, "/index.html", "bytes=0-99");
        assert!(req.bytes.starts_with(b"HEAD /index.html HTTP/1.1\r\n"));
        assert_eq!(req.headers().get("Range"), Some("bytes=0-99"));

        let req = conditional_range("/", "bytes=0-9", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(req.headers().get("If-Range"), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
    }

    #[test]
    fn test_slow_headers_never_terminate() {
        let req = slow_headers("/");
        assert_eq!(req.bytes, b"GET / HTTP/1.1\r\n");
        assert!(!req.bytes.windows(4).any(|w| w == b"\r\n\r\n"));
    }

    #[test]
    fn test_basic_auth_encoding() {
        let req = basic_auth("/secret", "admin", "secret");
        assert_eq!(req.headers().get("Authorization"), Some("Basic YWRtaW46c2VjcmV0"));
    }
}
