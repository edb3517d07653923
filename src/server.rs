//! Server-under-test lifecycle
//!
//! The harness only needs three things from whatever runs the server:
//! start it, tell when it accepts connections, and stop it. Readiness is
//! always a TCP connect probe, never a log scrape.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Controller errors. Any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Server not accepting connections on {0}")]
    NotReady(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Narrow interface to the server under test.
pub trait ServerController {
    type Handle;

    /// Launch with extra command-line flags.
    fn start(&mut self, flags: &[String]) -> Result<Self::Handle>;

    /// Poll until the server accepts TCP connections or `timeout` passes.
    fn wait_ready(&self, handle: &Self::Handle, timeout: Duration) -> bool;

    /// Terminate gracefully, forcing it after a grace period.
    fn stop(&mut self, handle: Self::Handle) -> Result<()>;
}

/// Poll a TCP connect to `addr` every 100 ms.
pub fn wait_for_port(addr: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs().map(|iter| iter.collect()).unwrap_or_default();
        for candidate in &addrs {
            if TcpStream::connect_timeout(candidate, READY_POLL_INTERVAL).is_ok() {
                tracing::debug!(%addr, "server ready");
                return true;
            }
        }
        if Instant::now() + READY_POLL_INTERVAL > deadline {
            return false;
        }
        thread::sleep(READY_POLL_INTERVAL);
    }
}

/// Server launched as a child process.
#[derive(Debug, Clone)]
pub struct ProcessController {
    program: PathBuf,
    base_args: Vec<String>,
    ready_addr: String,
    grace: Duration,
}

/// A running child process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl ProcessController {
    pub fn new(program: impl Into<PathBuf>, ready_addr: impl Into<String>) -> Self {
        ProcessController {
            program: program.into(),
            base_args: Vec::new(),
            ready_addr: ready_addr.into(),
            grace: Duration::from_secs(5),
        }
    }

    /// Arguments passed before the per-start flags.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Time between SIGTERM and SIGKILL.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn wait_exit(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl ServerController for ProcessController {
    type Handle = ProcessHandle;

    fn start(&mut self, flags: &[String]) -> Result<ProcessHandle> {
        let child = Command::new(&self.program)
            .args(&self.base_args)
            .args(flags)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ServerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        tracing::info!(program = %self.program.display(), pid = child.id(), ?flags, "server started");
        Ok(ProcessHandle { child })
    }

    fn wait_ready(&self, handle: &ProcessHandle, timeout: Duration) -> bool {
        tracing::debug!(pid = handle.pid(), addr = %self.ready_addr, ?timeout, "waiting for server");
        wait_for_port(&self.ready_addr, timeout)
    }

    fn stop(&mut self, mut handle: ProcessHandle) -> Result<()> {
        if let Some(status) = handle.child.try_wait()? {
            tracing::debug!(pid = handle.pid(), %status, "server already exited");
            return Ok(());
        }

        let pid = handle.pid() as libc::pid_t;
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            return Err(ServerError::Io(io::Error::last_os_error()));
        }

        if let Some(status) = Self::wait_exit(&mut handle.child, self.grace)? {
            tracing::info!(pid, %status, "server stopped");
            return Ok(());
        }

        tracing::warn!(pid, grace = ?self.grace, "server ignored SIGTERM, killing");
        handle.child.kill()?;
        let status = handle.child.wait()?;
        tracing::info!(pid, %status, "server killed");
        Ok(())
    }
}

/// Server started outside the harness.
#[derive(Debug, Clone)]
pub struct ExternalServer {
    ready_addr: String,
}

impl ExternalServer {
    pub fn new(ready_addr: impl Into<String>) -> Self {
        ExternalServer {
            ready_addr: ready_addr.into(),
        }
    }
}

impl ServerController for ExternalServer {
    type Handle = ();

    fn start(&mut self, _flags: &[String]) -> Result<()> {
        Ok(())
    }

    fn wait_ready(&self, _handle: &(), timeout: Duration) -> bool {
        wait_for_port(&self.ready_addr, timeout)
    }

    fn stop(&mut self, _handle: ()) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::net::TcpListener;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_wait_for_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(wait_for_port(&addr, Duration::from_secs(1)));

        drop(listener);
        let started = Instant::now();
        assert!(!wait_for_port(&addr, Duration::from_millis(300)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_external_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut server = ExternalServer::new(listener.local_addr().unwrap().to_string());
        server.start(&[]).unwrap();
        assert!(server.wait_ready(&(), Duration::from_secs(1)));
        server.stop(()).unwrap();
    }

    #[test]
    fn test_spawn_failure() {
        let mut controller = ProcessController::new("/nonexistent/vharness-server", "127.0.0.1:1");
        let err = controller.start(&[]).unwrap_err();
        assert!(matches!(err, ServerError::Spawn { .. }), "got {:?}", err);
    }

    #[test]
    fn test_process_stops_on_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "server.sh", "exec sleep 30");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        let mut controller = ProcessController::new(program, listener.local_addr().unwrap().to_string())
            .grace(Duration::from_secs(5));
        let handle = controller.start(&["--port".to_string(), "0".to_string()]).unwrap();
        assert!(controller.wait_ready(&handle, Duration::from_secs(1)));

        let started = Instant::now();
        controller.stop(handle).unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_process_killed_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "stubborn.sh", "trap '' TERM\nwhile true; do sleep 0.1; done");

        let mut controller = ProcessController::new(program, "127.0.0.1:1").grace(Duration::from_millis(300));
        let handle = controller.start(&[]).unwrap();
        // Let the shell install its trap.
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        controller.stop(handle).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
