//! HTTP/2 settings
//!
//! SETTINGS payloads are kept as the ordered list of (identifier, value)
//! pairs that went over the wire, so scenarios can inspect exactly what a
//! server advertised, including identifiers this crate does not know.

use super::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// HTTP/2 settings parameters (RFC 7540 Section 6.5.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SettingsParameter {
    HeaderTableSize = 0x1,
    EnablePush = 0x2,
    MaxConcurrentStreams = 0x3,
    InitialWindowSize = 0x4,
    MaxFrameSize = 0x5,
    MaxHeaderListSize = 0x6,
    /// RFC 8441
    EnableConnectProtocol = 0x8,
    /// RFC 9218
    NoRfc7540Priorities = 0x9,
}

impl SettingsParameter {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1 => Some(SettingsParameter::HeaderTableSize),
            0x2 => Some(SettingsParameter::EnablePush),
            0x3 => Some(SettingsParameter::MaxConcurrentStreams),
            0x4 => Some(SettingsParameter::InitialWindowSize),
            0x5 => Some(SettingsParameter::MaxFrameSize),
            0x6 => Some(SettingsParameter::MaxHeaderListSize),
            0x8 => Some(SettingsParameter::EnableConnectProtocol),
            0x9 => Some(SettingsParameter::NoRfc7540Priorities),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SettingsParameter::HeaderTableSize => "HEADER_TABLE_SIZE",
            SettingsParameter::EnablePush => "ENABLE_PUSH",
            SettingsParameter::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingsParameter::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingsParameter::MaxFrameSize => "MAX_FRAME_SIZE",
            SettingsParameter::MaxHeaderListSize => "MAX_HEADER_LIST_SIZE",
            SettingsParameter::EnableConnectProtocol => "ENABLE_CONNECT_PROTOCOL",
            SettingsParameter::NoRfc7540Priorities => "NO_RFC7540_PRIORITIES",
        }
    }

    /// Value assumed when a peer never sends the parameter.
    pub fn initial_value(&self) -> Option<u32> {
        match self {
            SettingsParameter::HeaderTableSize => Some(4096),
            SettingsParameter::EnablePush => Some(1),
            SettingsParameter::InitialWindowSize => Some(65535),
            SettingsParameter::MaxFrameSize => Some(16384),
            SettingsParameter::EnableConnectProtocol | SettingsParameter::NoRfc7540Priorities => Some(0),
            SettingsParameter::MaxConcurrentStreams | SettingsParameter::MaxHeaderListSize => None,
        }
    }
}

impl fmt::Display for SettingsParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u16())
    }
}

/// Settings in the order they appeared in a SETTINGS frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsMap {
    entries: Vec<(u16, u32)>,
}

impl SettingsMap {
    pub fn new() -> Self {
        SettingsMap::default()
    }

    /// Settings this client advertises on connection start.
    pub fn client_defaults() -> Self {
        SettingsMap::new()
            .with(SettingsParameter::EnablePush, 0)
            .with(SettingsParameter::MaxConcurrentStreams, 100)
            .with(SettingsParameter::InitialWindowSize, 65535)
    }

    pub fn with(mut self, param: SettingsParameter, value: u32) -> Self {
        self.set_raw(param.as_u16(), value);
        self
    }

    /// Append a raw entry; identifiers are not required to be known.
    pub fn set_raw(&mut self, id: u16, value: u32) {
        self.entries.push((id, value));
    }

    /// Last value sent for `param`; later entries override earlier ones.
    pub fn get(&self, param: SettingsParameter) -> Option<u32> {
        self.get_raw(param.as_u16())
    }

    pub fn get_raw(&self, id: u16) -> Option<u32> {
        self.entries.iter().rev().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }

    /// Value in effect for `param`, falling back to the protocol default.
    pub fn effective(&self, param: SettingsParameter) -> Option<u32> {
        self.get(param).or_else(|| param.initial_value())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a later SETTINGS frame on top of this one.
    pub fn merge(&mut self, other: &SettingsMap) {
        self.entries.extend_from_slice(&other.entries);
    }

    /// Parse a SETTINGS frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() % 6 != 0 {
            return Err(Error::FrameSize(format!(
                "SETTINGS payload of {} bytes is not a multiple of 6",
                payload.len()
            )));
        }
        let entries = payload
            .chunks_exact(6)
            .map(|c| {
                (
                    u16::from_be_bytes([c[0], c[1]]),
                    u32::from_be_bytes([c[2], c[3], c[4], c[5]]),
                )
            })
            .collect();
        Ok(SettingsMap { entries })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for (id, value) in &self.entries {
            buf.put_u16(*id);
            buf.put_u32(*value);
        }
    }

    /// Values a conforming peer must never send (RFC 7540 Section 6.5.2).
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (id, value) in self.iter() {
            match SettingsParameter::from_u16(id) {
                Some(SettingsParameter::EnablePush) if value > 1 => {
                    problems.push(format!("ENABLE_PUSH must be 0 or 1, got {}", value));
                }
                Some(SettingsParameter::InitialWindowSize) if value > 0x7FFF_FFFF => {
                    problems.push(format!("INITIAL_WINDOW_SIZE {} exceeds 2^31-1", value));
                }
                Some(SettingsParameter::MaxFrameSize) if !(16384..=16_777_215).contains(&value) => {
                    problems.push(format!("MAX_FRAME_SIZE {} outside 16384-16777215", value));
                }
                _ => {}
            }
        }
        problems
    }
}

impl fmt::Display for SettingsMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (id, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match SettingsParameter::from_u16(*id) {
                Some(param) => write!(f, "{}={}", param.name(), value)?,
                None => write!(f, "0x{:x}={}", id, value)?,
            }
        }
        f.write_str("}")
    }
}
