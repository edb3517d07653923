//! HTTP headers handling
//!
//! Headers are kept exactly as they appeared on the wire: insertion order is
//! preserved, duplicates stay separate entries and nothing is capped. Whether
//! a duplicate or an oversized block is a violation is for the caller to
//! decide.

use super::{Error, Result};
use std::fmt;

/// Ordered header list with case-insensitive lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers {
            headers: Vec::new(),
        }
    }

    /// Append a header, keeping any existing entries with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in wire order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Whether any comma-separated element of any `name` value equals `token`
    /// (case-insensitive, whitespace-trimmed).
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .into_iter()
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Bytes this block occupies on the wire, including CRLFs.
    pub fn wire_len(&self) -> usize {
        self.headers.iter().map(|(n, v)| n.len() + 2 + v.len() + 2).sum()
    }

    /// Split a header line on its first colon.
    ///
    /// The value is trimmed; the name must be non-empty and free of
    /// whitespace.
    pub fn parse_header_line(line: &str) -> Result<(String, String)> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeader(format!("no colon in header: {}", line)))?;

        if name.is_empty() {
            return Err(Error::InvalidHeader("empty header name".to_string()));
        }
        if name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(Error::InvalidHeader(format!("whitespace in header name: {:?}", name)));
        }

        Ok((name.to_string(), value.trim().to_string()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
