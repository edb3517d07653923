//! HTTP/2 frame encoding and decoding
//!
//! The encoders write complete frames into a `BytesMut` and accept any
//! stream id or error code, so callers can build frames a server should
//! refuse. [`FrameDecoder`] splits an arbitrary byte stream into frames.

use super::error::{Error, ErrorCode, Result};
use super::frames::{FrameFlags, FrameHeader, FrameType, RawFrame, FRAME_HEADER_SIZE};
use super::settings::SettingsMap;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Largest payload a frame header can describe (2^24 - 1).
pub const MAX_FRAME_SIZE: usize = 0x00FF_FFFF;

/// Append one frame.
pub fn encode_frame(buf: &mut BytesMut, kind: FrameType, flags: FrameFlags, stream_id: u32, payload: &[u8]) {
    let header = FrameHeader::new(kind, flags, stream_id, payload.len());
    buf.put_slice(&header.encode());
    buf.put_slice(payload);
}

pub fn encode_settings(buf: &mut BytesMut, settings: &SettingsMap) {
    let mut payload = BytesMut::with_capacity(settings.len() * 6);
    settings.encode(&mut payload);
    encode_frame(buf, FrameType::Settings, FrameFlags::empty(), 0, &payload);
}

pub fn encode_settings_ack(buf: &mut BytesMut) {
    encode_frame(buf, FrameType::Settings, FrameFlags::from_u8(FrameFlags::ACK), 0, &[]);
}

pub fn encode_ping(buf: &mut BytesMut, data: [u8; 8], ack: bool) {
    let flags = if ack {
        FrameFlags::from_u8(FrameFlags::ACK)
    } else {
        FrameFlags::empty()
    };
    encode_frame(buf, FrameType::Ping, flags, 0, &data);
}

/// HEADERS followed by as many CONTINUATION frames as `max_frame_size`
/// requires. END_STREAM goes on the HEADERS frame, END_HEADERS on the last.
pub fn encode_headers(buf: &mut BytesMut, stream_id: u32, block: &[u8], end_stream: bool, max_frame_size: usize) {
    let max = max_frame_size.clamp(1, MAX_FRAME_SIZE);
    let mut fragments = block.chunks(max);
    let first = fragments.next().unwrap_or(&[]);
    let mut rest = fragments.peekable();

    let mut flags = FrameFlags::empty();
    if end_stream {
        flags.set(FrameFlags::END_STREAM);
    }
    if rest.peek().is_none() {
        flags.set(FrameFlags::END_HEADERS);
    }
    encode_frame(buf, FrameType::Headers, flags, stream_id, first);

    while let Some(fragment) = rest.next() {
        let flags = if rest.peek().is_none() {
            FrameFlags::from_u8(FrameFlags::END_HEADERS)
        } else {
            FrameFlags::empty()
        };
        encode_frame(buf, FrameType::Continuation, flags, stream_id, fragment);
    }
}

/// DATA frames of at most `max_frame_size` bytes; END_STREAM on the last.
pub fn encode_data(buf: &mut BytesMut, stream_id: u32, data: &[u8], end_stream: bool, max_frame_size: usize) {
    let max = max_frame_size.clamp(1, MAX_FRAME_SIZE);
    if data.is_empty() {
        let flags = if end_stream {
            FrameFlags::from_u8(FrameFlags::END_STREAM)
        } else {
            FrameFlags::empty()
        };
        encode_frame(buf, FrameType::Data, flags, stream_id, &[]);
        return;
    }
    let mut chunks = data.chunks(max).peekable();
    while let Some(chunk) = chunks.next() {
        let flags = if end_stream && chunks.peek().is_none() {
            FrameFlags::from_u8(FrameFlags::END_STREAM)
        } else {
            FrameFlags::empty()
        };
        encode_frame(buf, FrameType::Data, flags, stream_id, chunk);
    }
}

pub fn encode_rst_stream(buf: &mut BytesMut, stream_id: u32, code: ErrorCode) {
    encode_frame(
        buf,
        FrameType::RstStream,
        FrameFlags::empty(),
        stream_id,
        &code.as_u32().to_be_bytes(),
    );
}

pub fn encode_goaway(buf: &mut BytesMut, last_stream_id: u32, code: ErrorCode, debug_data: &[u8]) {
    let mut payload = BytesMut::with_capacity(8 + debug_data.len());
    payload.put_u32(last_stream_id & 0x7FFF_FFFF);
    payload.put_u32(code.as_u32());
    payload.put_slice(debug_data);
    encode_frame(buf, FrameType::Goaway, FrameFlags::empty(), 0, &payload);
}

/// Incremental frame splitter
///
/// Frames longer than the configured maximum are reported once and their
/// payload is dropped as it arrives, so the buffer never holds more than
/// one acceptable frame plus whatever the last read delivered.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
    skip: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(16 * 1024),
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
            skip: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, if one has fully arrived.
    ///
    /// An oversized frame yields `Error::FrameSize` once; decoding resumes
    /// at the frame that follows it.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.skip > 0 {
            let dropped = self.skip.min(self.buffer.len());
            self.buffer.advance(dropped);
            self.skip -= dropped;
            if self.skip > 0 {
                return Ok(None);
            }
        }
        if self.buffer.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let mut head = [0u8; FRAME_HEADER_SIZE];
        head.copy_from_slice(&self.buffer[..FRAME_HEADER_SIZE]);
        let header = FrameHeader::parse(&head);

        if header.length > self.max_frame_size {
            self.buffer.advance(FRAME_HEADER_SIZE);
            self.skip = header.length;
            return Err(Error::FrameSize(format!(
                "{} exceeds advertised max frame size {}",
                header, self.max_frame_size
            )));
        }

        if self.buffer.len() < FRAME_HEADER_SIZE + header.length {
            return Ok(None);
        }
        self.buffer.advance(FRAME_HEADER_SIZE);
        let payload: Bytes = self.buffer.split_to(header.length).freeze();

        tracing::trace!(frame = %header, "frame decoded");
        Ok(Some(RawFrame { header, payload }))
    }
}
