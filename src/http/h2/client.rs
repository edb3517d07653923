//! Sans-I/O HTTP/2 client
//!
//! `Http2FrameClient` never touches a socket. Frames to send accumulate in
//! an outbound buffer drained with [`take_outbound`](Http2FrameClient::take_outbound),
//! and received bytes are handed to [`on_bytes`](Http2FrameClient::on_bytes),
//! which returns the events they produced in arrival order. SETTINGS
//! acknowledgements and PING replies are queued automatically.
//!
//! Flow control is not implemented: the client advertises the default
//! window and never sends WINDOW_UPDATE, which is enough for requests
//! whose responses fit in 64 KiB.

use super::codec::{self, FrameDecoder};
use super::error::{Error, ErrorCode, Result};
use super::frames::{Frame, RawFrame};
use super::hpack::{HeaderDecoder, HeaderEncoder};
use super::settings::{SettingsMap, SettingsParameter};
use super::{CONNECTION_PREFACE, MAX_STREAM_ID};
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Idle,
    AwaitingSettings,
    SettingsExchanged,
    Active,
    Terminated,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Idle => "idle",
            ClientState::AwaitingSettings => "awaiting settings",
            ClientState::SettingsExchanged => "settings exchanged",
            ClientState::Active => "active",
            ClientState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Something the server did, in the order it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Http2Event {
    SettingsReceived(SettingsMap),
    SettingsAcknowledged,
    HeadersReceived {
        stream_id: u32,
        headers: Vec<(String, String)>,
        status: Option<u16>,
    },
    DataReceived {
        stream_id: u32,
        len: usize,
    },
    StreamEnded(u32),
    StreamReset {
        stream_id: u32,
        error_code: ErrorCode,
    },
    ConnectionTerminated {
        error_code: ErrorCode,
        last_stream_id: u32,
        debug_data: Bytes,
    },
    PingReceived,
    ProtocolViolation(String),
}

impl fmt::Display for Http2Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Http2Event::SettingsReceived(s) => write!(f, "SETTINGS {}", s),
            Http2Event::SettingsAcknowledged => f.write_str("SETTINGS ACK"),
            Http2Event::HeadersReceived { stream_id, status, .. } => match status {
                Some(code) => write!(f, "HEADERS stream={} :status={}", stream_id, code),
                None => write!(f, "HEADERS stream={}", stream_id),
            },
            Http2Event::DataReceived { stream_id, len } => write!(f, "DATA stream={} len={}", stream_id, len),
            Http2Event::StreamEnded(id) => write!(f, "END_STREAM stream={}", id),
            Http2Event::StreamReset { stream_id, error_code } => {
                write!(f, "RST_STREAM stream={} {}", stream_id, error_code)
            }
            Http2Event::ConnectionTerminated {
                error_code,
                last_stream_id,
                debug_data,
            } => {
                write!(f, "GOAWAY last_stream={} {}", last_stream_id, error_code)?;
                if !debug_data.is_empty() {
                    write!(f, " {:?}", String::from_utf8_lossy(debug_data))?;
                }
                Ok(())
            }
            Http2Event::PingReceived => f.write_str("PING"),
            Http2Event::ProtocolViolation(reason) => write!(f, "protocol violation: {}", reason),
        }
    }
}

/// SETTINGS_MAX_FRAME_SIZE initial value (RFC 7540 Section 6.5.2).
const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;

/// Encoded header block cap when no MAX_HEADER_LIST_SIZE is advertised.
pub const DEFAULT_MAX_HEADER_BLOCK: usize = 64 * 1024;

/// Header block spread over HEADERS and CONTINUATION frames.
struct PendingBlock {
    stream_id: u32,
    block: BytesMut,
    end_stream: bool,
    /// Cap exceeded; remaining fragments are dropped until END_HEADERS.
    overflowed: bool,
}

/// Minimal HTTP/2 client state machine
pub struct Http2FrameClient {
    state: ClientState,
    decoder: FrameDecoder,
    outbound: BytesMut,
    encoder: HeaderEncoder,
    hpack: HeaderDecoder,
    local_settings: SettingsMap,
    remote_settings: SettingsMap,
    next_stream_id: u32,
    streams_opened: u32,
    pending: Option<PendingBlock>,
}

impl Http2FrameClient {
    pub fn new() -> Self {
        Self::with_settings(SettingsMap::client_defaults())
    }

    /// Client that advertises `settings` in its first SETTINGS frame.
    pub fn with_settings(settings: SettingsMap) -> Self {
        let max_frame_size = settings
            .effective(SettingsParameter::MaxFrameSize)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE) as usize;
        Http2FrameClient {
            state: ClientState::Idle,
            decoder: FrameDecoder::with_max_frame_size(max_frame_size),
            outbound: BytesMut::new(),
            encoder: HeaderEncoder::new(),
            hpack: HeaderDecoder::new(),
            local_settings: settings,
            remote_settings: SettingsMap::new(),
            next_stream_id: 1,
            streams_opened: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Everything the server has advertised so far, in order.
    pub fn remote_settings(&self) -> &SettingsMap {
        &self.remote_settings
    }

    pub fn streams_opened(&self) -> u32 {
        self.streams_opened
    }

    /// Highest stream id handed out, 0 before the first stream.
    pub fn last_stream_id(&self) -> u32 {
        self.next_stream_id.saturating_sub(2)
    }

    /// Queue the connection preface and the initial SETTINGS frame.
    pub fn initiate(&mut self) -> Result<()> {
        if self.state != ClientState::Idle {
            return Err(Error::InvalidState(format!("initiate while {}", self.state)));
        }
        self.outbound.extend_from_slice(CONNECTION_PREFACE);
        codec::encode_settings(&mut self.outbound, &self.local_settings);
        self.transition(ClientState::AwaitingSettings);
        Ok(())
    }

    /// Open a stream with an already encoded header list.
    pub fn open_stream<N: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, headers: &[(N, V)], end_stream: bool) -> Result<u32> {
        self.check_can_send()?;
        let block = self.encoder.encode(headers);
        self.open_stream_with_block(&block, end_stream)
    }

    /// Open a stream with a caller-supplied HPACK block, sent verbatim.
    pub fn open_stream_with_block(&mut self, block: &[u8], end_stream: bool) -> Result<u32> {
        self.check_can_send()?;
        if self.next_stream_id > MAX_STREAM_ID {
            return Err(Error::StreamIdsExhausted);
        }
        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;
        self.streams_opened += 1;

        let max_frame_size = self.peer_max_frame_size();
        codec::encode_headers(&mut self.outbound, stream_id, block, end_stream, max_frame_size);
        if self.state == ClientState::SettingsExchanged {
            self.transition(ClientState::Active);
        }
        tracing::trace!(stream_id, end_stream, block_len = block.len(), "stream opened");
        Ok(stream_id)
    }

    pub fn send_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> Result<()> {
        self.check_can_send()?;
        let max_frame_size = self.peer_max_frame_size();
        codec::encode_data(&mut self.outbound, stream_id, data, end_stream, max_frame_size);
        Ok(())
    }

    /// Queue RST_STREAM. The id is not checked so that resets of idle
    /// streams can be sent on purpose.
    pub fn reset_stream(&mut self, stream_id: u32, code: ErrorCode) -> Result<()> {
        self.check_can_send()?;
        codec::encode_rst_stream(&mut self.outbound, stream_id, code);
        Ok(())
    }

    /// Queue GOAWAY and stop accepting new work.
    pub fn goaway(&mut self, code: ErrorCode) -> Result<()> {
        if self.state == ClientState::Terminated {
            return Err(Error::Terminated);
        }
        codec::encode_goaway(&mut self.outbound, 0, code, &[]);
        self.transition(ClientState::Terminated);
        Ok(())
    }

    /// Record that the transport went away without a GOAWAY.
    pub fn connection_lost(&mut self) {
        self.transition(ClientState::Terminated);
    }

    /// Bytes waiting to be written.
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Decode received bytes into events.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Vec<Http2Event> {
        self.decoder.push(bytes);
        let mut events = Vec::new();
        loop {
            match self.decoder.next_frame() {
                Ok(Some(raw)) => self.on_frame(raw, &mut events),
                Ok(None) => break,
                Err(e) => events.push(Http2Event::ProtocolViolation(e.to_string())),
            }
        }
        events
    }

    fn on_frame(&mut self, raw: RawFrame, events: &mut Vec<Http2Event>) {
        let frame = match Frame::parse(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                events.push(Http2Event::ProtocolViolation(e.to_string()));
                return;
            }
        };

        if let Some(pending) = &self.pending {
            let continues = matches!(&frame, Frame::Continuation { stream_id, .. } if *stream_id == pending.stream_id);
            if !continues {
                events.push(Http2Event::ProtocolViolation(format!(
                    "expected CONTINUATION for stream {}, got {}",
                    pending.stream_id, raw.header
                )));
                self.pending = None;
            }
        }

        match frame {
            Frame::Settings { ack: true, .. } => events.push(Http2Event::SettingsAcknowledged),
            Frame::Settings { ack: false, settings } => {
                for problem in settings.violations() {
                    events.push(Http2Event::ProtocolViolation(problem));
                }
                self.remote_settings.merge(&settings);
                codec::encode_settings_ack(&mut self.outbound);
                if self.state == ClientState::AwaitingSettings {
                    self.transition(ClientState::SettingsExchanged);
                }
                events.push(Http2Event::SettingsReceived(settings));
            }
            Frame::Ping { ack, data } => {
                if !ack {
                    codec::encode_ping(&mut self.outbound, data, true);
                    events.push(Http2Event::PingReceived);
                }
            }
            Frame::Headers {
                stream_id,
                fragment,
                end_stream,
                end_headers,
            } => {
                if end_headers {
                    self.finish_block(stream_id, &fragment, end_stream, events);
                } else {
                    let mut pending = PendingBlock {
                        stream_id,
                        block: BytesMut::new(),
                        end_stream,
                        overflowed: false,
                    };
                    self.append_fragment(&mut pending, &fragment, events);
                    self.pending = Some(pending);
                }
            }
            Frame::Continuation {
                stream_id,
                fragment,
                end_headers,
            } => match self.pending.take() {
                Some(mut pending) => {
                    self.append_fragment(&mut pending, &fragment, events);
                    if end_headers && pending.overflowed {
                        if pending.end_stream {
                            events.push(Http2Event::StreamEnded(stream_id));
                        }
                    } else if end_headers {
                        self.finish_block(stream_id, &pending.block, pending.end_stream, events);
                    } else {
                        self.pending = Some(pending);
                    }
                }
                None => events.push(Http2Event::ProtocolViolation(format!(
                    "CONTINUATION on stream {} without HEADERS",
                    stream_id
                ))),
            },
            Frame::Data {
                stream_id,
                len,
                end_stream,
            } => {
                events.push(Http2Event::DataReceived { stream_id, len });
                if end_stream {
                    events.push(Http2Event::StreamEnded(stream_id));
                }
            }
            Frame::RstStream { stream_id, error_code } => {
                events.push(Http2Event::StreamReset { stream_id, error_code });
            }
            Frame::Goaway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                self.transition(ClientState::Terminated);
                events.push(Http2Event::ConnectionTerminated {
                    error_code,
                    last_stream_id,
                    debug_data,
                });
            }
            Frame::WindowUpdate { .. } | Frame::Ignored { .. } => {
                tracing::trace!(frame = %raw.header, "frame ignored");
            }
        }
    }

    fn append_fragment(&self, pending: &mut PendingBlock, fragment: &[u8], events: &mut Vec<Http2Event>) {
        if pending.overflowed {
            return;
        }
        let cap = self.max_header_block();
        if pending.block.len() + fragment.len() > cap {
            events.push(Http2Event::ProtocolViolation(format!(
                "header block on stream {} exceeds {} bytes",
                pending.stream_id, cap
            )));
            pending.overflowed = true;
            pending.block = BytesMut::new();
            return;
        }
        pending.block.extend_from_slice(fragment);
    }

    fn finish_block(&mut self, stream_id: u32, block: &[u8], end_stream: bool, events: &mut Vec<Http2Event>) {
        match self.hpack.decode(block) {
            Ok(headers) => {
                let status = headers
                    .iter()
                    .find(|(name, _)| name == ":status")
                    .and_then(|(_, value)| value.parse().ok());
                events.push(Http2Event::HeadersReceived {
                    stream_id,
                    headers,
                    status,
                });
            }
            Err(e) => events.push(Http2Event::ProtocolViolation(format!(
                "header block on stream {}: {}",
                stream_id, e
            ))),
        }
        if end_stream {
            events.push(Http2Event::StreamEnded(stream_id));
        }
    }

    fn check_can_send(&self) -> Result<()> {
        match self.state {
            ClientState::SettingsExchanged | ClientState::Active => Ok(()),
            ClientState::Terminated => Err(Error::Terminated),
            other => Err(Error::InvalidState(format!("cannot send frames while {}", other))),
        }
    }

    fn transition(&mut self, next: ClientState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "h2 client state");
            self.state = next;
        }
    }

    fn peer_max_frame_size(&self) -> usize {
        self.remote_settings
            .effective(SettingsParameter::MaxFrameSize)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE) as usize
    }

    fn max_header_block(&self) -> usize {
        self.local_settings
            .effective(SettingsParameter::MaxHeaderListSize)
            .map_or(DEFAULT_MAX_HEADER_BLOCK, |size| size as usize)
    }
}

impl Default for Http2FrameClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Pseudo-header list for a request without a body.
pub fn request_headers(method: &str, scheme: &str, authority: &str, path: &str) -> Vec<(String, String)> {
    vec![
        (":method".to_string(), method.to_string()),
        (":scheme".to_string(), scheme.to_string()),
        (":authority".to_string(), authority.to_string()),
        (":path".to_string(), path.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::h2::frames::{FrameFlags, FrameType};

    fn server_settings() -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec::encode_settings(
            &mut buf,
            &SettingsMap::new()
                .with(SettingsParameter::HeaderTableSize, 4096)
                .with(SettingsParameter::MaxHeaderListSize, 16384),
        );
        buf.to_vec()
    }

    fn established() -> Http2FrameClient {
        let mut client = Http2FrameClient::new();
        client.initiate().unwrap();
        client.on_bytes(&server_settings());
        client.take_outbound();
        client
    }

    #[test]
    fn test_initiate_writes_preface_and_settings() {
        let mut client = Http2FrameClient::new();
        client.initiate().unwrap();
        let out = client.take_outbound();
        assert!(out.starts_with(CONNECTION_PREFACE));
        assert_eq!(out[CONNECTION_PREFACE.len() + 3], FrameType::Settings.as_u8());
        assert_eq!(client.state(), ClientState::AwaitingSettings);
        assert!(matches!(client.initiate(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_open_stream_before_settings_is_rejected() {
        let mut client = Http2FrameClient::new();
        assert!(matches!(
            client.open_stream(&request_headers("GET", "https", "h", "/"), true),
            Err(Error::InvalidState(_))
        ));
        client.initiate().unwrap();
        assert!(matches!(client.reset_stream(1, ErrorCode::Cancel), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_settings_are_acknowledged() {
        let mut client = Http2FrameClient::new();
        client.initiate().unwrap();
        client.take_outbound();

        let events = client.on_bytes(&server_settings());
        match &events[..] {
            [Http2Event::SettingsReceived(map)] => {
                assert_eq!(map.get(SettingsParameter::MaxHeaderListSize), Some(16384));
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(client.state(), ClientState::SettingsExchanged);
        assert_eq!(&client.take_outbound()[..], &[0, 0, 0, 0x4, 0x1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_stream_ids_are_odd_and_increasing() {
        let mut client = established();
        let headers = request_headers("GET", "https", "localhost", "/");
        let ids: Vec<u32> = (0..4).map(|_| client.open_stream(&headers, true).unwrap()).collect();
        assert_eq!(ids, vec![1, 3, 5, 7]);
        assert_eq!(client.state(), ClientState::Active);
        assert_eq!(client.streams_opened(), 4);
        assert_eq!(client.last_stream_id(), 7);
    }

    #[test]
    fn test_stream_id_exhaustion() {
        let mut client = established();
        client.next_stream_id = MAX_STREAM_ID;
        assert_eq!(client.open_stream_with_block(&[0x82], true).unwrap(), MAX_STREAM_ID);
        assert!(matches!(client.open_stream_with_block(&[0x82], true), Err(Error::StreamIdsExhausted)));
    }

    #[test]
    fn test_response_headers_and_data() {
        let mut client = established();
        let id = client
            .open_stream(&request_headers("GET", "https", "localhost", "/"), true)
            .unwrap();

        let mut server = BytesMut::new();
        let block = HeaderEncoder::new().encode(&[(":status", "200")]);
        codec::encode_headers(&mut server, id, &block, false, 16384);
        codec::encode_data(&mut server, id, b"hello", true, 16384);

        let events = client.on_bytes(&server);
        assert_eq!(
            events,
            vec![
                Http2Event::HeadersReceived {
                    stream_id: 1,
                    headers: vec![(":status".to_string(), "200".to_string())],
                    status: Some(200),
                },
                Http2Event::DataReceived { stream_id: 1, len: 5 },
                Http2Event::StreamEnded(1),
            ]
        );
    }

    #[test]
    fn test_continuation_reassembly() {
        let mut client = established();
        let block = HeaderEncoder::new().encode(&[(":status", "404"), ("x-long", "abcdefghijklmnopqrstuvwxyz")]);
        let mut server = BytesMut::new();
        codec::encode_headers(&mut server, 1, &block, true, 8);

        let events = client.on_bytes(&server);
        assert!(matches!(
            &events[0],
            Http2Event::HeadersReceived { status: Some(404), headers, .. } if headers.len() == 2
        ));
        assert_eq!(events[1], Http2Event::StreamEnded(1));
    }

    #[test]
    fn test_interrupted_continuation_is_violation() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_frame(&mut server, FrameType::Headers, FrameFlags::empty(), 1, &[0x88]);
        codec::encode_ping(&mut server, [0; 8], false);
        let events = client.on_bytes(&server);
        assert!(matches!(events[0], Http2Event::ProtocolViolation(_)));
        assert_eq!(events[1], Http2Event::PingReceived);
    }

    #[test]
    fn test_goaway_terminates() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_goaway(&mut server, 99, ErrorCode::EnhanceYourCalm, b"too many resets");
        let events = client.on_bytes(&server);
        assert!(matches!(
            &events[0],
            Http2Event::ConnectionTerminated { error_code: ErrorCode::EnhanceYourCalm, last_stream_id: 99, .. }
        ));
        assert_eq!(client.state(), ClientState::Terminated);
        assert!(matches!(client.open_stream_with_block(&[0x82], true), Err(Error::Terminated)));
        assert!(matches!(client.reset_stream(1, ErrorCode::Cancel), Err(Error::Terminated)));
    }

    #[test]
    fn test_ping_is_answered() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_ping(&mut server, [9; 8], false);
        assert_eq!(client.on_bytes(&server), vec![Http2Event::PingReceived]);
        let out = client.take_outbound();
        assert_eq!(out[4], FrameFlags::ACK);
        assert_eq!(&out[9..], &[9; 8]);
    }

    #[test]
    fn test_oversized_frame_is_violation() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_data(&mut server, 1, &vec![0u8; 20_000], false, 20_000);
        let events = client.on_bytes(&server);
        assert!(matches!(&events[0], Http2Event::ProtocolViolation(msg) if msg.contains("max frame size")));
    }

    #[test]
    fn test_unknown_frame_ignored_and_rst_reported() {
        let mut client = established();
        let mut server = BytesMut::new();
        server.extend_from_slice(&[0, 0, 1, 0xfa, 0, 0, 0, 0, 0, 0xff]);
        codec::encode_rst_stream(&mut server, 3, ErrorCode::RefusedStream);
        assert_eq!(
            client.on_bytes(&server),
            vec![Http2Event::StreamReset {
                stream_id: 3,
                error_code: ErrorCode::RefusedStream
            }]
        );
    }

    #[test]
    fn test_bad_header_block_is_violation() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_headers(&mut server, 1, &[0xFE], false, 16384);
        let events = client.on_bytes(&server);
        assert!(matches!(&events[0], Http2Event::ProtocolViolation(msg) if msg.contains("stream 1")));
    }

    #[test]
    fn test_malformed_hpack_integers_are_violations() {
        let mut client = established();
        let mut server = BytesMut::new();
        // Size update with a missing continuation, then a literal whose name index is cut short.
        codec::encode_headers(&mut server, 1, &[0x3f], true, 16384);
        codec::encode_headers(&mut server, 3, &[0x1f], true, 16384);
        codec::encode_headers(&mut server, 5, &[0x3f, 0xff, 0xff, 0xff, 0xff, 0x0f], true, 16384);
        let events = client.on_bytes(&server);
        let violations = events
            .iter()
            .filter(|e| matches!(e, Http2Event::ProtocolViolation(_)))
            .count();
        assert_eq!(violations, 3, "{:?}", events);

        // The dynamic table was never touched, so later blocks still decode.
        let mut server = BytesMut::new();
        let block = HeaderEncoder::new().encode(&[(":status", "200")]);
        codec::encode_headers(&mut server, 7, &block, true, 16384);
        assert!(matches!(
            &client.on_bytes(&server)[0],
            Http2Event::HeadersReceived { stream_id: 7, status: Some(200), .. }
        ));
    }

    #[test]
    fn test_continuation_flood_is_capped() {
        let mut client = Http2FrameClient::with_settings(
            SettingsMap::client_defaults().with(SettingsParameter::MaxHeaderListSize, 4096),
        );
        client.initiate().unwrap();
        client.on_bytes(&server_settings());

        let mut server = BytesMut::new();
        codec::encode_frame(&mut server, FrameType::Headers, FrameFlags::empty(), 1, &[0x88]);
        let mut events = client.on_bytes(&server);
        for _ in 0..64 {
            let mut server = BytesMut::new();
            codec::encode_frame(&mut server, FrameType::Continuation, FrameFlags::empty(), 1, &[0u8; 1024]);
            events.extend(client.on_bytes(&server));
            let held = client.pending.as_ref().map_or(0, |p| p.block.len());
            assert!(held <= 4096, "{} bytes held", held);
        }
        assert_eq!(
            events,
            vec![Http2Event::ProtocolViolation(
                "header block on stream 1 exceeds 4096 bytes".to_string()
            )]
        );

        // END_HEADERS closes the dropped block without decoding it.
        let mut server = BytesMut::new();
        codec::encode_frame(
            &mut server,
            FrameType::Continuation,
            FrameFlags::from_u8(FrameFlags::END_HEADERS),
            1,
            &[0u8; 16],
        );
        codec::encode_ping(&mut server, [0; 8], false);
        assert_eq!(client.on_bytes(&server), vec![Http2Event::PingReceived]);
    }

    #[test]
    fn test_decoding_resumes_after_oversized_frame() {
        let mut client = established();
        let mut server = BytesMut::new();
        codec::encode_data(&mut server, 1, &vec![0u8; 20_000], false, 20_000);
        codec::encode_ping(&mut server, [1; 8], false);
        let events = client.on_bytes(&server);
        assert_eq!(events.len(), 2, "{:?}", events);
        assert_eq!(events[1], Http2Event::PingReceived);
    }
}
