//! Chunked transfer coding
//!
//! The decoder is an incremental state machine fed arbitrary slices of a
//! response body. It records the size of every data chunk so callers can
//! check how the server segmented its output. The encoder helpers build
//! request bodies, including ones whose chunk-size line lies about the
//! payload that follows.

use super::{Error, Headers, Result};

/// Append one chunk (size line, data, CRLF). Empty input writes nothing.
pub fn push_chunk(out: &mut Vec<u8>, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Append the zero-size chunk and the empty trailer section.
pub fn push_last_chunk(out: &mut Vec<u8>) {
    out.extend_from_slice(b"0\r\n\r\n");
}

/// Encode `data` as a complete chunked body using chunks of `chunk_size`.
pub fn encode_chunked_body(data: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    for chunk in data.chunks(chunk_size.max(1)) {
        push_chunk(&mut out, chunk);
    }
    push_last_chunk(&mut out);
    out
}

/// Longest chunk-size or trailer line accepted.
pub const MAX_LINE_BYTES: usize = 8 * 1024;
/// Largest trailer section accepted.
pub const MAX_TRAILER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkEnd,
    Trailer,
    Complete,
}

/// Incremental chunked body decoder
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
    line: Vec<u8>,
    chunk_sizes: Vec<usize>,
    trailers: Headers,
    trailer_bytes: usize,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            line: Vec::new(),
            chunk_sizes: Vec::new(),
            trailers: Headers::new(),
            trailer_bytes: 0,
        }
    }

    /// Decode as much of `input` as possible, appending payload to `output`.
    ///
    /// Returns the number of input bytes consumed. Bytes past the end of the
    /// body are left unconsumed.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let mut pos = 0;

        while pos < input.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(line) = self.take_line(input, &mut pos)? else {
                        break;
                    };
                    let size = parse_chunk_size(&line)?;
                    if size == 0 {
                        self.state = DecoderState::Trailer;
                    } else {
                        self.chunk_sizes.push(size as usize);
                        self.state = DecoderState::ChunkData { remaining: size };
                    }
                }

                DecoderState::ChunkData { remaining } => {
                    let available = (input.len() - pos) as u64;
                    let take = remaining.min(available) as usize;
                    output.extend_from_slice(&input[pos..pos + take]);
                    pos += take;

                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        DecoderState::ChunkEnd
                    } else {
                        DecoderState::ChunkData { remaining }
                    };
                }

                DecoderState::ChunkEnd => {
                    let Some(line) = self.take_line(input, &mut pos)? else {
                        break;
                    };
                    if !line.is_empty() {
                        return Err(Error::Protocol(format!(
                            "expected CRLF after chunk data, found {:?}",
                            String::from_utf8_lossy(&line)
                        )));
                    }
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    let Some(line) = self.take_line(input, &mut pos)? else {
                        break;
                    };
                    if line.is_empty() {
                        self.state = DecoderState::Complete;
                        break;
                    }
                    self.trailer_bytes += line.len() + 2;
                    if self.trailer_bytes > MAX_TRAILER_BYTES {
                        return Err(Error::Protocol(format!(
                            "trailer section exceeds {} bytes",
                            MAX_TRAILER_BYTES
                        )));
                    }
                    let line = String::from_utf8_lossy(&line);
                    let (name, value) = Headers::parse_header_line(&line)?;
                    self.trailers.insert(name, value);
                }

                DecoderState::Complete => break,
            }
        }

        Ok(pos)
    }

    /// Accumulate up to the next CRLF; `None` if the line is still partial.
    fn take_line(&mut self, input: &[u8], pos: &mut usize) -> Result<Option<Vec<u8>>> {
        let rest = &input[*pos..];
        let (part, line_done) = match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => (&rest[..idx], true),
            None => (rest, false),
        };
        if self.line.len() + part.len() > MAX_LINE_BYTES {
            return Err(Error::Protocol(format!("line exceeds {} bytes", MAX_LINE_BYTES)));
        }
        self.line.extend_from_slice(part);
        if !line_done {
            *pos = input.len();
            return Ok(None);
        }
        *pos += part.len() + 1;
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }

    /// Bytes still owed by the chunk in progress, if one is open.
    pub fn remaining_in_chunk(&self) -> Option<usize> {
        match self.state {
            DecoderState::ChunkData { remaining } => Some(remaining as usize),
            _ => None,
        }
    }

    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    pub fn into_parts(self) -> (Vec<usize>, Headers) {
        (self.chunk_sizes, self.trailers)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a chunk-size line, ignoring any `;ext=value` extensions.
fn parse_chunk_size(line: &[u8]) -> Result<u64> {
    let line = String::from_utf8_lossy(line);
    let size = line.split(';').next().unwrap_or("").trim();

    if size.is_empty() || size.len() > 16 || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidChunkSize(size.to_string()));
    }
    u64::from_str_radix(size, 16).map_err(|_| Error::InvalidChunkSize(size.to_string()))
}

/// Decode a complete chunked body held in memory.
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ChunkedDecoder::new();
    let mut output = Vec::new();
    decoder.decode(input, &mut output)?;

    if !decoder.is_complete() {
        return Err(Error::Incomplete);
    }
    Ok(output)
}
