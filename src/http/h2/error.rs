//! HTTP/2 error types
//!
//! `Error` covers misuse of the client state machine and frame encoding
//! failures. Anything the *server* does wrong is reported as an
//! [`Http2Event::ProtocolViolation`](super::Http2Event) instead.

use std::fmt;

/// HTTP/2 client errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation not allowed in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The connection has received or sent GOAWAY
    #[error("Connection terminated")]
    Terminated,

    /// All 2^31 stream identifiers have been used
    #[error("Stream identifiers exhausted")]
    StreamIdsExhausted,

    /// Frame payload exceeds what the frame header can express
    #[error("Frame size error: {0}")]
    FrameSize(String),

    /// Frame bytes could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Header block could not be decoded
    #[error("Compression error: {0}")]
    Compression(String),
}

/// HTTP/2 error codes (RFC 7540 Section 7)
///
/// Codes outside the registry are kept as `Unknown` so they can be
/// reported verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Unknown(u32),
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        match self {
            ErrorCode::NoError => 0x0,
            ErrorCode::ProtocolError => 0x1,
            ErrorCode::InternalError => 0x2,
            ErrorCode::FlowControlError => 0x3,
            ErrorCode::SettingsTimeout => 0x4,
            ErrorCode::StreamClosed => 0x5,
            ErrorCode::FrameSizeError => 0x6,
            ErrorCode::RefusedStream => 0x7,
            ErrorCode::Cancel => 0x8,
            ErrorCode::CompressionError => 0x9,
            ErrorCode::ConnectError => 0xa,
            ErrorCode::EnhanceYourCalm => 0xb,
            ErrorCode::InadequateSecurity => 0xc,
            ErrorCode::Http11Required => 0xd,
            ErrorCode::Unknown(code) => code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
            ErrorCode::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

/// Result type for HTTP/2 operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::NoError.as_u32(), 0x0);
        assert_eq!(ErrorCode::Http11Required.as_u32(), 0xd);

        assert_eq!(ErrorCode::from(0x1), ErrorCode::ProtocolError);
        assert_eq!(ErrorCode::from(0xb), ErrorCode::EnhanceYourCalm);
        assert_eq!(ErrorCode::from(0xff), ErrorCode::Unknown(0xff));
        assert_eq!(ErrorCode::Unknown(0xff).as_u32(), 0xff);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Cancel.to_string(), "CANCEL (0x8)");
        assert_eq!(ErrorCode::Unknown(0x42).to_string(), "UNKNOWN (0x42)");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState("open_stream before SETTINGS".to_string());
        assert_eq!(err.to_string(), "Invalid state: open_stream before SETTINGS");
        assert_eq!(Error::Terminated.to_string(), "Connection terminated");
    }
}
