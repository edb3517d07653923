//! Write pacing
//!
//! A pacing policy splits an outgoing byte sequence into segments and fixes
//! the pause between consecutive segments. The driver writes one segment,
//! checks the socket for early responses or a peer close, then sleeps.

use std::ops::Range;
use std::time::Duration;

/// How a request is written to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacingPolicy {
    /// Write everything at once.
    #[default]
    Immediate,
    /// One byte, then `delay`, repeated.
    PerByte(Duration),
    /// `size` bytes, then `delay`, repeated.
    PerChunk { size: usize, delay: Duration },
}

impl PacingPolicy {
    /// Byte ranges written in one go, in order.
    pub fn segments(&self, len: usize) -> Vec<Range<usize>> {
        let step = match *self {
            PacingPolicy::Immediate => len.max(1),
            PacingPolicy::PerByte(_) => 1,
            PacingPolicy::PerChunk { size, .. } => size.max(1),
        };

        (0..len)
            .step_by(step)
            .map(|start| start..(start + step).min(len))
            .collect()
    }

    /// Pause inserted between two segments.
    pub fn delay(&self) -> Duration {
        match *self {
            PacingPolicy::Immediate => Duration::ZERO,
            PacingPolicy::PerByte(delay) => delay,
            PacingPolicy::PerChunk { delay, .. } => delay,
        }
    }

    /// Whether the driver interleaves readability checks between segments.
    pub fn is_paced(&self) -> bool {
        !matches!(self, PacingPolicy::Immediate)
    }

    /// Lower bound on how long sending `len` bytes takes.
    pub fn minimum_duration(&self, len: usize) -> Duration {
        let gaps = self.segments(len).len().saturating_sub(1) as u32;
        self.delay() * gaps
    }
}
