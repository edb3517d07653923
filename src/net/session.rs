//! Session operations abstraction
//!
//! A `SessionOps` implementation is the raw transport underneath a
//! [`Connection`](super::Connection). Plain TCP and TLS sessions expose the
//! same poll/read/write/close surface so the driver never branches on the
//! transport kind.

use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

/// Operations a transport session must support.
pub trait SessionOps: Send {
    /// Wait until the session is ready for `events`.
    ///
    /// Returns `Ok(false)` when the timeout elapsed first. `None` waits forever.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn close(&mut self) -> Result<()>;

    /// ALPN protocol selected during the handshake, if any.
    fn alpn(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// Poll a raw descriptor with `libc::poll`.
///
/// Shared by the plain and TLS sessions; the TLS session checks its own
/// buffered plaintext before falling through to the socket.
pub(crate) fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLERR, POLLHUP, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1);

    loop {
        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };
        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Io(err));
        }
        // HUP/ERR count as ready: the following read or write reports the condition.
        return Ok(result > 0 && pfd.revents & (pfd.events | POLLHUP | POLLERR) != 0);
    }
}

/// Plain TCP session
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Already torn down by the peer.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}
