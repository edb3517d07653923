//! HTTP message types
//!
//! Requests leave the harness as raw bytes (see [`request`](super::request)),
//! so only the pieces needed to describe them survive here. Responses are
//! reconstructed by the [`reader`](super::reader) and are immutable once
//! handed out.

use super::{Error, Headers, Result};
use std::fmt;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical reason phrase, used when explaining verdicts.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        416 => "Range Not Satisfiable",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}

/// How the end of a response body was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ContentLength(u64),
    Chunked,
    CloseDelimited,
    NoBody,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::ContentLength(n) => write!(f, "content-length({})", n),
            Framing::Chunked => f.write_str("chunked"),
            Framing::CloseDelimited => f.write_str("close-delimited"),
            Framing::NoBody => f.write_str("no-body"),
        }
    }
}

/// Status line and header block of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Protocol token exactly as sent, e.g. `HTTP/1.1`.
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl ResponseHead {
    /// Informational, 204 and 304 responses never carry a body.
    pub fn forbids_body(&self) -> bool {
        (100..200).contains(&self.status) || self.status == 204 || self.status == 304
    }
}

impl fmt::Display for ResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status, self.reason)
    }
}

/// A complete HTTP/1.x response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    head: ResponseHead,
    body: Vec<u8>,
    framing: Framing,
    chunk_sizes: Vec<usize>,
}

impl HttpResponse {
    pub(crate) fn new(head: ResponseHead, body: Vec<u8>, framing: Framing, chunk_sizes: Vec<usize>) -> Self {
        HttpResponse {
            head,
            body,
            framing,
            chunk_sizes,
        }
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn reason(&self) -> &str {
        &self.head.reason
    }

    pub fn version(&self) -> &str {
        &self.head.version
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Sizes of the data chunks received, in order. Empty unless chunked.
    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    /// A 1xx reply other than 101; the final response follows it.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.head.status) && self.head.status != 101
    }

    /// Whether the server announced it will close after this response.
    pub fn closes_connection(&self) -> bool {
        self.headers().has_token("Connection", "close")
            || (self.head.version == "HTTP/1.0" && !self.headers().has_token("Connection", "keep-alive"))
            || self.framing == Framing::CloseDelimited
    }

    /// Case-insensitive search over the header block and the body.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        let head = format!("{}\r\n{}", self.head, self.head.headers).to_ascii_lowercase();
        head.contains(&needle) || self.body_text().to_ascii_lowercase().contains(&needle)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}; {} body bytes]", self.head, self.framing, self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(version: &str, status: u16, headers: &[(&str, &str)], framing: Framing) -> HttpResponse {
        let head = ResponseHead {
            version: version.to_string(),
            status,
            reason: reason_phrase(status).to_string(),
            headers: headers.iter().copied().collect(),
        };
        HttpResponse::new(head, b"Duplicate Transfer-Encoding header".to_vec(), framing, Vec::new())
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(Method::from_str("GET").unwrap(), Method::Get);
        assert_eq!(Method::from_str("OPTIONS").unwrap(), Method::Options);
        assert!(Method::from_str("get").is_err());
    }

    #[test]
    fn test_forbids_body() {
        for (status, forbidden) in [(100, true), (204, true), (304, true), (200, false), (416, false)] {
            let head = ResponseHead {
                version: "HTTP/1.1".into(),
                status,
                reason: String::new(),
                headers: Headers::new(),
            };
            assert_eq!(head.forbids_body(), forbidden, "status {}", status);
        }
    }

    #[test]
    fn test_is_interim() {
        assert!(response("HTTP/1.1", 100, &[], Framing::NoBody).is_interim());
        assert!(response("HTTP/1.1", 103, &[], Framing::NoBody).is_interim());
        assert!(!response("HTTP/1.1", 101, &[], Framing::NoBody).is_interim());
        assert!(!response("HTTP/1.1", 200, &[], Framing::ContentLength(3)).is_interim());
    }

    #[test]
    fn test_closes_connection() {
        let r = response("HTTP/1.1", 200, &[("Connection", "close")], Framing::ContentLength(3));
        assert!(r.closes_connection());

        let r = response("HTTP/1.1", 200, &[], Framing::ContentLength(3));
        assert!(!r.closes_connection());

        let r = response("HTTP/1.0", 200, &[], Framing::ContentLength(3));
        assert!(r.closes_connection());

        let r = response("HTTP/1.0", 200, &[("Connection", "Keep-Alive")], Framing::ContentLength(3));
        assert!(!r.closes_connection());
    }

    #[test]
    fn test_mentions_searches_head_and_body() {
        let r = response("HTTP/1.1", 400, &[("X-Reason", "mutually exclusive")], Framing::NoBody);
        assert!(r.mentions("DUPLICATE"));
        assert!(r.mentions("Mutually Exclusive"));
        assert!(r.mentions("bad request"));
        assert!(!r.mentions("smuggled"));
    }
}
