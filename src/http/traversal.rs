//! Path traversal request targets
//!
//! Each vector climbs out of the document root towards `etc/passwd` using a
//! different spelling of the parent-directory step. Servers are expected to
//! refuse all of them.

use super::request::{RawRequest, RequestBuilder};
use std::fmt;

/// How the `..` + separator step is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Literal,
    Backslash,
    PercentEncoded,
    DoubleEncoded,
    TripleEncoded,
    OverlongUtf8,
    NullByteSuffix,
    MixedSeparators,
    CollapsingDots,
}

impl Encoding {
    pub const ALL: [Encoding; 9] = [
        Encoding::Literal,
        Encoding::Backslash,
        Encoding::PercentEncoded,
        Encoding::DoubleEncoded,
        Encoding::TripleEncoded,
        Encoding::OverlongUtf8,
        Encoding::NullByteSuffix,
        Encoding::MixedSeparators,
        Encoding::CollapsingDots,
    ];

    /// Parent-directory step for the `i`th level.
    fn step(self, i: usize) -> &'static str {
        match self {
            Encoding::Literal | Encoding::NullByteSuffix => "../",
            Encoding::Backslash => "..\\",
            Encoding::PercentEncoded => "..%2f",
            Encoding::DoubleEncoded => "..%252f",
            Encoding::TripleEncoded => "..%25252f",
            Encoding::OverlongUtf8 => "..%c0%af",
            Encoding::MixedSeparators if i % 2 == 1 => "..%5c",
            Encoding::MixedSeparators => "..%2f",
            Encoding::CollapsingDots => "....//",
        }
    }

    fn file(self) -> &'static str {
        match self {
            Encoding::Backslash => "etc\\passwd",
            Encoding::NullByteSuffix => "etc/passwd%00.html",
            _ => "etc/passwd",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Literal => "literal ../",
            Encoding::Backslash => "backslash ..\\",
            Encoding::PercentEncoded => "percent-encoded %2f",
            Encoding::DoubleEncoded => "double-encoded %252f",
            Encoding::TripleEncoded => "triple-encoded %25252f",
            Encoding::OverlongUtf8 => "overlong UTF-8 %c0%af",
            Encoding::NullByteSuffix => "null byte suffix %00",
            Encoding::MixedSeparators => "mixed %2f/%5c",
            Encoding::CollapsingDots => "collapsing ....//",
        };
        f.write_str(name)
    }
}

/// One traversal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalVector {
    pub encoding: Encoding,
    pub path: String,
}

impl TraversalVector {
    pub fn new(encoding: Encoding, depth: usize) -> Self {
        let mut path = String::from("/");
        for i in 0..depth {
            path.push_str(encoding.step(i));
        }
        path.push_str(encoding.file());
        TraversalVector { encoding, path }
    }

    pub fn request(&self) -> RawRequest {
        RequestBuilder::get(self.path.as_str())
            .probe("RFC 3986 §5.2.4", format!("path traversal, {}", self.encoding))
            .build()
    }
}

/// All vectors at the default depth of three levels.
pub fn vectors() -> Vec<TraversalVector> {
    Encoding::ALL
        .iter()
        .map(|&encoding| TraversalVector::new(encoding, 3))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_paths() {
        let paths: Vec<String> = vectors().into_iter().map(|v| v.path).collect();
        assert!(paths.contains(&"/../../../etc/passwd".to_string()));
        assert!(paths.contains(&"/..\\..\\..\\etc\\passwd".to_string()));
        assert!(paths.contains(&"/..%2f..%2f..%2fetc/passwd".to_string()));
        assert!(paths.contains(&"/..%252f..%252f..%252fetc/passwd".to_string()));
        assert!(paths.contains(&"/..%c0%af..%c0%af..%c0%afetc/passwd".to_string()));
        assert!(paths.contains(&"/....//....//....//etc/passwd".to_string()));
        assert!(paths.contains(&"/../../../etc/passwd%00.html".to_string()));
        assert!(paths.contains(&"/..%2f..%5c..%2fetc/passwd".to_string()));
        assert!(paths.contains(&"/..%25252f..%25252f..%25252fetc/passwd".to_string()));
    }

    #[test]
    fn test_every_encoding_covered_once() {
        let vectors = vectors();
        assert_eq!(vectors.len(), Encoding::ALL.len());
        for encoding in Encoding::ALL {
            assert_eq!(vectors.iter().filter(|v| v.encoding == encoding).count(), 1);
        }
    }

    #[test]
    fn test_request_line_carries_path_verbatim() {
        let vector = TraversalVector::new(Encoding::OverlongUtf8, 1);
        let request = vector.request();
        assert!(request.bytes.starts_with(b"GET /..%c0%afetc/passwd HTTP/1.1\r\n"));
        assert!(request.probe.description.contains("overlong"));
    }
}
