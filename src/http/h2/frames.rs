//! HTTP/2 frame types
//!
//! [`FrameHeader`] and [`RawFrame`] are what comes off the wire; [`Frame`]
//! is the typed view the client acts on, with padding and priority fields
//! already stripped.

use super::error::{Error, ErrorCode, Result};
use super::settings::SettingsMap;
use bytes::Bytes;
use std::fmt;

/// HTTP/2 frame header size
pub const FRAME_HEADER_SIZE: usize = 9;

/// HTTP/2 frame types (RFC 7540 Section 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    Goaway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
}

impl FrameType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// `None` for extension frame types, which receivers must ignore.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(FrameType::Data),
            0x1 => Some(FrameType::Headers),
            0x2 => Some(FrameType::Priority),
            0x3 => Some(FrameType::RstStream),
            0x4 => Some(FrameType::Settings),
            0x5 => Some(FrameType::PushPromise),
            0x6 => Some(FrameType::Ping),
            0x7 => Some(FrameType::Goaway),
            0x8 => Some(FrameType::WindowUpdate),
            0x9 => Some(FrameType::Continuation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::Headers => "HEADERS",
            FrameType::Priority => "PRIORITY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::PushPromise => "PUSH_PROMISE",
            FrameType::Ping => "PING",
            FrameType::Goaway => "GOAWAY",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Continuation => "CONTINUATION",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u8())
    }
}

/// HTTP/2 frame flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub const END_STREAM: u8 = 0x1;
    /// Same bit as END_STREAM, on SETTINGS and PING.
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;

    pub fn empty() -> Self {
        FrameFlags(0)
    }

    pub fn from_u8(flags: u8) -> Self {
        FrameFlags(flags)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn is_set(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn is_end_stream(&self) -> bool {
        self.is_set(Self::END_STREAM)
    }

    pub fn is_ack(&self) -> bool {
        self.is_set(Self::ACK)
    }

    pub fn is_end_headers(&self) -> bool {
        self.is_set(Self::END_HEADERS)
    }

    pub fn is_padded(&self) -> bool {
        self.is_set(Self::PADDED)
    }

    pub fn is_priority(&self) -> bool {
        self.is_set(Self::PRIORITY)
    }
}

/// The fixed 9-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: usize,
    pub kind: u8,
    pub flags: FrameFlags,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn new(kind: FrameType, flags: FrameFlags, stream_id: u32, length: usize) -> Self {
        FrameHeader {
            length,
            kind: kind.as_u8(),
            flags,
            stream_id,
        }
    }

    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.kind)
    }

    pub fn parse(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let length = ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | (bytes[2] as usize);
        // Reserved bit ignored on receipt.
        let stream_id = u32::from_be_bytes([bytes[5] & 0x7F, bytes[6], bytes[7], bytes[8]]);
        FrameHeader {
            length,
            kind: bytes[3],
            flags: FrameFlags::from_u8(bytes[4]),
            stream_id,
        }
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let id = (self.stream_id & 0x7FFF_FFFF).to_be_bytes();
        [
            ((self.length >> 16) & 0xFF) as u8,
            ((self.length >> 8) & 0xFF) as u8,
            (self.length & 0xFF) as u8,
            self.kind,
            self.flags.as_u8(),
            id[0],
            id[1],
            id[2],
            id[3],
        ]
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame_type() {
            Some(t) => write!(f, "{}", t.name())?,
            None => write!(f, "type 0x{:x}", self.kind)?,
        }
        write!(
            f,
            " stream={} len={} flags=0x{:02x}",
            self.stream_id,
            self.length,
            self.flags.as_u8()
        )
    }
}

/// A complete frame as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// Typed view of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: u32,
        /// Payload length without padding.
        len: usize,
        end_stream: bool,
    },
    Headers {
        stream_id: u32,
        fragment: Bytes,
        end_stream: bool,
        end_headers: bool,
    },
    Continuation {
        stream_id: u32,
        fragment: Bytes,
        end_headers: bool,
    },
    RstStream {
        stream_id: u32,
        error_code: ErrorCode,
    },
    Settings {
        ack: bool,
        settings: SettingsMap,
    },
    Ping {
        ack: bool,
        data: [u8; 8],
    },
    Goaway {
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: Bytes,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    /// PRIORITY, PUSH_PROMISE and extension frames, which carry nothing the
    /// client acts on.
    Ignored { kind: u8, stream_id: u32 },
}

impl Frame {
    /// Interpret a raw frame, validating fixed payload sizes and padding.
    pub fn parse(raw: &RawFrame) -> Result<Frame> {
        let h = &raw.header;
        let payload = &raw.payload;
        let Some(kind) = h.frame_type() else {
            return Ok(Frame::Ignored {
                kind: h.kind,
                stream_id: h.stream_id,
            });
        };

        let frame = match kind {
            FrameType::Data => {
                require_stream(h)?;
                let body = strip_padding(h, payload)?;
                Frame::Data {
                    stream_id: h.stream_id,
                    len: body.len(),
                    end_stream: h.flags.is_end_stream(),
                }
            }
            FrameType::Headers => {
                require_stream(h)?;
                let mut body = strip_padding(h, payload)?;
                if h.flags.is_priority() {
                    if body.len() < 5 {
                        return Err(Error::FrameSize("HEADERS priority fields truncated".to_string()));
                    }
                    body = body.slice(5..);
                }
                Frame::Headers {
                    stream_id: h.stream_id,
                    fragment: body,
                    end_stream: h.flags.is_end_stream(),
                    end_headers: h.flags.is_end_headers(),
                }
            }
            FrameType::Continuation => {
                require_stream(h)?;
                Frame::Continuation {
                    stream_id: h.stream_id,
                    fragment: payload.clone(),
                    end_headers: h.flags.is_end_headers(),
                }
            }
            FrameType::RstStream => {
                require_stream(h)?;
                require_len(h, payload, 4)?;
                Frame::RstStream {
                    stream_id: h.stream_id,
                    error_code: ErrorCode::from(be_u32(&payload[..4])),
                }
            }
            FrameType::Settings => {
                require_connection(h)?;
                if h.flags.is_ack() && !payload.is_empty() {
                    return Err(Error::FrameSize("SETTINGS ACK with a payload".to_string()));
                }
                Frame::Settings {
                    ack: h.flags.is_ack(),
                    settings: SettingsMap::decode(payload)?,
                }
            }
            FrameType::Ping => {
                require_connection(h)?;
                require_len(h, payload, 8)?;
                let mut data = [0u8; 8];
                data.copy_from_slice(&payload[..8]);
                Frame::Ping {
                    ack: h.flags.is_ack(),
                    data,
                }
            }
            FrameType::Goaway => {
                require_connection(h)?;
                if payload.len() < 8 {
                    return Err(Error::FrameSize(format!("GOAWAY payload of {} bytes", payload.len())));
                }
                Frame::Goaway {
                    last_stream_id: be_u32(&payload[..4]) & 0x7FFF_FFFF,
                    error_code: ErrorCode::from(be_u32(&payload[4..8])),
                    debug_data: payload.slice(8..),
                }
            }
            FrameType::WindowUpdate => {
                require_len(h, payload, 4)?;
                Frame::WindowUpdate {
                    stream_id: h.stream_id,
                    increment: be_u32(&payload[..4]) & 0x7FFF_FFFF,
                }
            }
            FrameType::Priority | FrameType::PushPromise => Frame::Ignored {
                kind: h.kind,
                stream_id: h.stream_id,
            },
        };
        Ok(frame)
    }
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn require_stream(h: &FrameHeader) -> Result<()> {
    if h.stream_id == 0 {
        return Err(Error::Protocol(format!("{} on stream 0", h)));
    }
    Ok(())
}

fn require_connection(h: &FrameHeader) -> Result<()> {
    if h.stream_id != 0 {
        return Err(Error::Protocol(format!("{} on a non-zero stream", h)));
    }
    Ok(())
}

fn require_len(h: &FrameHeader, payload: &Bytes, len: usize) -> Result<()> {
    if payload.len() != len {
        return Err(Error::FrameSize(format!("{} payload must be {} bytes", h, len)));
    }
    Ok(())
}

fn strip_padding(h: &FrameHeader, payload: &Bytes) -> Result<Bytes> {
    if !h.flags.is_padded() {
        return Ok(payload.clone());
    }
    let Some(&pad) = payload.first() else {
        return Err(Error::FrameSize(format!("{} padded without a pad length", h)));
    };
    let pad = pad as usize;
    if pad + 1 > payload.len() {
        return Err(Error::Protocol(format!("{} padding {} exceeds payload", h, pad)));
    }
    Ok(payload.slice(1..payload.len() - pad))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: FrameType, flags: u8, stream_id: u32, payload: &[u8]) -> RawFrame {
        RawFrame {
            header: FrameHeader::new(kind, FrameFlags::from_u8(flags), stream_id, payload.len()),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn test_frame_type_conversion() {
        assert_eq!(FrameType::Continuation.as_u8(), 0x9);
        assert_eq!(FrameType::from_u8(0x7), Some(FrameType::Goaway));
        assert_eq!(FrameType::from_u8(0xff), None);
    }

    #[test]
    fn test_header_encode_parse() {
        let header = FrameHeader::new(
            FrameType::Headers,
            FrameFlags::from_u8(FrameFlags::END_STREAM | FrameFlags::END_HEADERS),
            42,
            1234,
        );
        let bytes = header.encode();
        assert_eq!(FrameHeader::parse(&bytes), header);
    }

    #[test]
    fn test_reserved_bit_ignored() {
        let header = FrameHeader::parse(&[0, 0, 0, 0, 0, 0x80, 0, 0, 1]);
        assert_eq!(header.stream_id, 1);
    }

    #[test]
    fn test_padded_headers_with_priority() {
        let mut payload = vec![2u8];
        payload.extend_from_slice(&[0, 0, 0, 0, 16]);
        payload.extend_from_slice(b"\x88");
        payload.extend_from_slice(&[0, 0]);
        let frame = raw(
            FrameType::Headers,
            FrameFlags::PADDED | FrameFlags::PRIORITY | FrameFlags::END_HEADERS,
            1,
            &payload,
        );
        match Frame::parse(&frame).unwrap() {
            Frame::Headers { fragment, end_headers, .. } => {
                assert_eq!(&fragment[..], b"\x88");
                assert!(end_headers);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_padding_overflow_rejected() {
        let frame = raw(FrameType::Data, FrameFlags::PADDED, 1, &[10, b'a']);
        assert!(Frame::parse(&frame).is_err());
    }

    #[test]
    fn test_goaway_parse() {
        let frame = raw(FrameType::Goaway, 0, 0, &[0, 0, 0, 7, 0, 0, 0, 0xb, b'x']);
        assert_eq!(
            Frame::parse(&frame).unwrap(),
            Frame::Goaway {
                last_stream_id: 7,
                error_code: ErrorCode::EnhanceYourCalm,
                debug_data: Bytes::from_static(b"x"),
            }
        );
    }

    #[test]
    fn test_stream_zero_checks() {
        assert!(Frame::parse(&raw(FrameType::RstStream, 0, 0, &[0, 0, 0, 8])).is_err());
        assert!(Frame::parse(&raw(FrameType::Settings, 0, 3, &[])).is_err());
    }

    #[test]
    fn test_unknown_type_ignored() {
        let frame = RawFrame {
            header: FrameHeader {
                length: 0,
                kind: 0xfa,
                flags: FrameFlags::empty(),
                stream_id: 0,
            },
            payload: Bytes::new(),
        };
        assert_eq!(
            Frame::parse(&frame).unwrap(),
            Frame::Ignored { kind: 0xfa, stream_id: 0 }
        );
    }
}
