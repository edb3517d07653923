//! Message framing analysis
//!
//! Decides, from a header block alone, how the body of a message is
//! delimited. The response reader and the request builder share this code so
//! that a request crafted with conflicting framing headers is classified
//! exactly the way the reader would classify the same headers on a
//! response.

use super::Headers;
use std::fmt;

/// Framing declared by a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingAnalysis {
    /// Neither `Content-Length` nor `Transfer-Encoding`.
    Unspecified,
    ContentLength(u64),
    Chunked,
    /// `Transfer-Encoding` whose final coding is not `chunked`.
    OtherCoding(String),
    /// Both `Content-Length` and `Transfer-Encoding` are present.
    Ambiguous {
        content_length: Vec<String>,
        transfer_encoding: Vec<String>,
    },
    /// `Content-Length` values that disagree or are not numbers.
    ConflictingContentLength(Vec<String>),
}

impl FramingAnalysis {
    /// Whether the headers violate RFC 7230 §3.3.3 framing rules.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            FramingAnalysis::Ambiguous { .. } | FramingAnalysis::ConflictingContentLength(_)
        )
    }
}

impl fmt::Display for FramingAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingAnalysis::Unspecified => f.write_str("unspecified"),
            FramingAnalysis::ContentLength(n) => write!(f, "Content-Length {}", n),
            FramingAnalysis::Chunked => f.write_str("chunked"),
            FramingAnalysis::OtherCoding(c) => write!(f, "Transfer-Encoding {}", c),
            FramingAnalysis::Ambiguous {
                content_length,
                transfer_encoding,
            } => write!(
                f,
                "ambiguous: Content-Length {:?} with Transfer-Encoding {:?}",
                content_length, transfer_encoding
            ),
            FramingAnalysis::ConflictingContentLength(values) => {
                write!(f, "conflicting Content-Length {:?}", values)
            }
        }
    }
}

/// Classify the framing declared by `headers`.
pub fn analyze(headers: &Headers) -> FramingAnalysis {
    let content_length: Vec<String> = headers
        .get_all("Content-Length")
        .into_iter()
        .map(str::to_string)
        .collect();
    let transfer_encoding: Vec<String> = headers
        .get_all("Transfer-Encoding")
        .into_iter()
        .map(str::to_string)
        .collect();

    if !content_length.is_empty() && !transfer_encoding.is_empty() {
        return FramingAnalysis::Ambiguous {
            content_length,
            transfer_encoding,
        };
    }

    if !transfer_encoding.is_empty() {
        let last = transfer_encoding
            .iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .last()
            .unwrap_or("");
        return if last.eq_ignore_ascii_case("chunked") {
            FramingAnalysis::Chunked
        } else {
            FramingAnalysis::OtherCoding(transfer_encoding.join(", "))
        };
    }

    if content_length.is_empty() {
        return FramingAnalysis::Unspecified;
    }

    // "5, 5" and repeated identical headers are tolerated (RFC 7230 §3.3.2).
    let mut length = None;
    for element in content_length.iter().flat_map(|v| v.split(',')).map(str::trim) {
        let parsed = match parse_length(element) {
            Some(n) => n,
            None => return FramingAnalysis::ConflictingContentLength(content_length),
        };
        match length {
            Some(existing) if existing != parsed => {
                return FramingAnalysis::ConflictingContentLength(content_length)
            }
            _ => length = Some(parsed),
        }
    }

    match length {
        Some(n) => FramingAnalysis::ContentLength(n),
        None => FramingAnalysis::ConflictingContentLength(content_length),
    }
}

fn parse_length(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
