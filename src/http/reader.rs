//! Incremental HTTP/1.x response reader
//!
//! `Http1ResponseReader` accepts response bytes in whatever slices the
//! transport delivers and reports after every call how far it has got.
//! Framing is decided from the request method the reader was created for
//! and from the response headers:
//!
//! 1. `HEAD` requests, and 1xx/204/304 statuses, have no body
//! 2. Both `Content-Length` and `Transfer-Encoding` present is reported as
//!    [`ReaderState::AmbiguousFraming`]; disagreeing or non-numeric
//!    `Content-Length` values as [`ReaderState::ConflictingContentLength`]
//! 3. `OPTIONS` replies without any framing header have no body
//! 4. `Content-Length: n` reads exactly `n` bytes
//! 5. A final `chunked` transfer coding reads chunks up to the zero chunk
//! 6. Anything else is delimited by the peer closing the connection
//!
//! Conditions in (2) are terminal states, not errors: the reader never picks
//! one of the competing lengths on the server's behalf.

use super::chunked::ChunkedDecoder;
use super::framing::{self, FramingAnalysis};
use super::message::{Framing, HttpResponse, ResponseHead};
use super::Headers;

/// Header blocks larger than this are reported as malformed.
pub const MAX_HEAD_BYTES: usize = 1024 * 1024;

/// Progress of a reader after a `feed` or `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    NeedMoreHeaderBytes,
    /// Body bytes still expected; `None` when the count is not known up front.
    NeedMoreBodyBytes(Option<usize>),
    Complete(HttpResponse),
    Malformed(String),
    AmbiguousFraming(ResponseHead),
    ConflictingContentLength(ResponseHead),
}

impl ReaderState {
    /// Whether feeding more bytes can change the state.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            ReaderState::NeedMoreHeaderBytes | ReaderState::NeedMoreBodyBytes(_)
        )
    }
}

enum BodyKind {
    Length { remaining: u64 },
    Chunked(ChunkedDecoder),
    UntilClose,
}

enum Phase {
    Head,
    Body {
        head: ResponseHead,
        framing: Framing,
        kind: BodyKind,
        body: Vec<u8>,
    },
    Done(ReaderState),
}

/// Incremental response reader
pub struct Http1ResponseReader {
    method: String,
    buffer: Vec<u8>,
    scanned: usize,
    phase: Phase,
}

impl Http1ResponseReader {
    /// Reader for the response to a `GET`.
    pub fn new() -> Self {
        Self::for_method("GET")
    }

    /// Reader for the response to a request sent with `method`.
    pub fn for_method(method: &str) -> Self {
        Http1ResponseReader {
            method: method.to_ascii_uppercase(),
            buffer: Vec::new(),
            scanned: 0,
            phase: Phase::Head,
        }
    }

    /// Consume `bytes` and report progress.
    pub fn feed(&mut self, bytes: &[u8]) -> ReaderState {
        if let Phase::Done(state) = &self.phase {
            // Pipelined bytes after the response belong to the next one.
            self.buffer.extend_from_slice(bytes);
            return state.clone();
        }

        self.buffer.extend_from_slice(bytes);

        if matches!(self.phase, Phase::Head) {
            if let Some(state) = self.read_head() {
                return state;
            }
        }

        self.read_body()
    }

    /// Signal that the peer closed the connection.
    pub fn finish(&mut self) -> ReaderState {
        let state = match std::mem::replace(&mut self.phase, Phase::Head) {
            Phase::Done(state) => state,
            Phase::Head if self.buffer.is_empty() => {
                ReaderState::Malformed("connection closed before any response bytes".to_string())
            }
            Phase::Head => ReaderState::Malformed(format!(
                "connection closed inside the header block after {} bytes",
                self.buffer.len()
            )),
            Phase::Body {
                head,
                framing,
                kind,
                body,
            } => match kind {
                BodyKind::UntilClose => ReaderState::Complete(HttpResponse::new(head, body, framing, Vec::new())),
                BodyKind::Length { remaining } => ReaderState::Malformed(format!(
                    "connection closed with {} of {} body bytes missing",
                    remaining,
                    remaining + body.len() as u64
                )),
                BodyKind::Chunked(_) => {
                    ReaderState::Malformed("connection closed before the last chunk".to_string())
                }
            },
        };
        self.phase = Phase::Done(state.clone());
        state
    }

    /// Bytes received beyond the end of a completed response.
    pub fn take_leftover(&mut self) -> Vec<u8> {
        if matches!(self.phase, Phase::Done(_)) {
            std::mem::take(&mut self.buffer)
        } else {
            Vec::new()
        }
    }

    fn done(&mut self, state: ReaderState) -> ReaderState {
        self.phase = Phase::Done(state.clone());
        state
    }

    /// Locate and parse the header block. `None` once the body phase begins.
    fn read_head(&mut self) -> Option<ReaderState> {
        let start = self.scanned.saturating_sub(3);
        let end = match find_head_end(&self.buffer[start..]) {
            Some(idx) => start + idx,
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > MAX_HEAD_BYTES {
                    let reason = format!("header block exceeds {} bytes", MAX_HEAD_BYTES);
                    return Some(self.done(ReaderState::Malformed(reason)));
                }
                return Some(ReaderState::NeedMoreHeaderBytes);
            }
        };

        let head = match parse_head(&self.buffer[..end]) {
            Ok(head) => head,
            Err(reason) => return Some(self.done(ReaderState::Malformed(reason))),
        };
        self.buffer.drain(..end + 4);

        tracing::trace!(status = head.status, headers = head.headers.len(), "response head parsed");

        let (framing, kind) = if self.method == "HEAD" || head.forbids_body() {
            (Framing::NoBody, None)
        } else {
            match framing::analyze(&head.headers) {
                FramingAnalysis::Ambiguous { .. } => {
                    return Some(self.done(ReaderState::AmbiguousFraming(head)));
                }
                FramingAnalysis::ConflictingContentLength(_) => {
                    return Some(self.done(ReaderState::ConflictingContentLength(head)));
                }
                FramingAnalysis::Unspecified if self.method == "OPTIONS" => (Framing::NoBody, None),
                FramingAnalysis::ContentLength(n) => (
                    Framing::ContentLength(n),
                    Some(BodyKind::Length { remaining: n }),
                ),
                FramingAnalysis::Chunked => (Framing::Chunked, Some(BodyKind::Chunked(ChunkedDecoder::new()))),
                FramingAnalysis::Unspecified | FramingAnalysis::OtherCoding(_) => {
                    (Framing::CloseDelimited, Some(BodyKind::UntilClose))
                }
            }
        };

        match kind {
            None => Some(self.done(ReaderState::Complete(HttpResponse::new(
                head,
                Vec::new(),
                framing,
                Vec::new(),
            )))),
            Some(kind) => {
                self.phase = Phase::Body {
                    head,
                    framing,
                    kind,
                    body: Vec::new(),
                };
                None
            }
        }
    }

    fn read_body(&mut self) -> ReaderState {
        let Phase::Body { kind, body, .. } = &mut self.phase else {
            return ReaderState::NeedMoreHeaderBytes;
        };

        match kind {
            BodyKind::Length { remaining } => {
                let take = (*remaining).min(self.buffer.len() as u64) as usize;
                body.extend(self.buffer.drain(..take));
                *remaining -= take as u64;
                if *remaining > 0 {
                    return ReaderState::NeedMoreBodyBytes(Some(*remaining as usize));
                }
            }
            BodyKind::Chunked(decoder) => match decoder.decode(&self.buffer, body) {
                Ok(consumed) => {
                    self.buffer.drain(..consumed);
                    if !decoder.is_complete() {
                        return ReaderState::NeedMoreBodyBytes(decoder.remaining_in_chunk());
                    }
                }
                Err(e) => {
                    let reason = format!("invalid chunked body: {}", e);
                    return self.done(ReaderState::Malformed(reason));
                }
            },
            BodyKind::UntilClose => {
                body.append(&mut self.buffer);
                return ReaderState::NeedMoreBodyBytes(None);
            }
        }

        let Phase::Body {
            mut head,
            framing,
            kind,
            body,
        } = std::mem::replace(&mut self.phase, Phase::Head)
        else {
            return ReaderState::NeedMoreHeaderBytes;
        };

        let chunk_sizes = match kind {
            BodyKind::Chunked(decoder) => {
                let (sizes, trailers) = decoder.into_parts();
                for (name, value) in trailers.iter() {
                    head.headers.insert(name, value);
                }
                sizes
            }
            _ => Vec::new(),
        };

        self.done(ReaderState::Complete(HttpResponse::new(head, body, framing, chunk_sizes)))
    }
}

impl Default for Http1ResponseReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the status line and header lines (without the blank line).
fn parse_head(raw: &[u8]) -> Result<ResponseHead, String> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or("");
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    let code = parts.next().unwrap_or("");
    let reason = parts.next().unwrap_or("").trim();

    if !version.starts_with("HTTP/") {
        return Err(format!("invalid status line: {:?}", status_line));
    }
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("status code is not 3 digits: {:?}", code));
    }
    let status: u16 = code
        .parse()
        .map_err(|_| format!("status code is not 3 digits: {:?}", code))?;

    let mut headers = Headers::new();
    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(format!("obsolete line folding: {:?}", line));
        }
        let (name, value) = Headers::parse_header_line(line).map_err(|e| e.to_string())?;
        headers.insert(name, value);
    }

    Ok(ResponseHead {
        version: version.to_string(),
        status,
        reason: reason.to_string(),
        headers,
    })
}
