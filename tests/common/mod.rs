//! In-process mock servers for the integration tests
//!
//! Every mock binds `127.0.0.1:0` and serves each accepted connection on its
//! own thread until the test process exits.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vharness::config::HarnessConfig;
use vharness::net::SessionOps;

/// Accept connections forever, one handler thread each.
pub fn spawn<F>(handler: F) -> SocketAddr
where
    F: Fn(TcpStream) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler(stream));
        }
    });
    addr
}

/// Harness configuration pointing both ports at `addr`.
pub fn config(addr: SocketAddr) -> HarnessConfig {
    HarnessConfig::new("127.0.0.1", addr.port())
        .tls_port(addr.port())
        .connect_timeout(Duration::from_secs(2))
        .response_timeout(Duration::from_secs(2))
}

/// A request head as the mock saw it.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub head: String,
}

impl MockRequest {
    pub fn request_line(&self) -> &str {
        self.head.split("\r\n").next().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.request_line().split(' ').nth(1).unwrap_or("")
    }

    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.head
            .split("\r\n")
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .filter(|(n, _)| n.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers(name).into_iter().next()
    }

    pub fn wants_close(&self) -> bool {
        self.header("Connection").is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }
}

/// Read until a complete head is buffered. Returns `None` on EOF.
pub fn read_head(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<MockRequest> {
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end + 4]).into_owned();
            buf.drain(..end + 4);
            return Some(MockRequest { head });
        }
        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

pub fn response(status: u16, reason: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {} {}\r\n", status, reason);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    out.into_bytes()
}

/// Half-close, then drain whatever the client still sends so the close
/// never turns into a reset.
pub fn linger_close(mut stream: TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let mut sink = [0u8; 4096];
    while let Ok(n) = stream.read(&mut sink) {
        if n == 0 {
            break;
        }
    }
}

/// HTTP/1.1 mock. `respond` sees each head; bodies framed by a single
/// `Content-Length` are consumed. Any other framing, or a close request,
/// ends the connection after the response.
pub fn http1_server<F>(respond: F) -> SocketAddr
where
    F: Fn(&MockRequest) -> Vec<u8> + Send + Sync + 'static,
{
    spawn(move |mut stream| {
        let mut buf = Vec::new();
        while let Some(request) = read_head(&mut stream, &mut buf) {
            let lengths = request.headers("Content-Length");
            let simple_body = request.headers("Transfer-Encoding").is_empty() && lengths.len() <= 1;
            if let Some(len) = lengths.first().and_then(|v| v.parse::<usize>().ok()).filter(|_| simple_body) {
                while buf.len() < len {
                    let mut chunk = [0u8; 4096];
                    match stream.read(&mut chunk) {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                buf.drain(..len);
            }

            let reply = respond(&request);
            if stream.write_all(&reply).is_err() {
                return;
            }
            if !simple_body || request.wants_close() {
                linger_close(stream);
                return;
            }
        }
    })
}

pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;

pub fn frame(kind: u8, flags: u8, stream: u32, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u32;
    let mut out = vec![(len >> 16) as u8, (len >> 8) as u8, len as u8, kind, flags];
    out.extend_from_slice(&stream.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// SETTINGS advertising the given `(identifier, value)` pairs.
pub fn settings(params: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (id, value) in params {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    frame(FRAME_SETTINGS, 0, 0, &payload)
}

pub fn goaway(last_stream: u32, code: u32) -> Vec<u8> {
    let mut payload = last_stream.to_be_bytes().to_vec();
    payload.extend_from_slice(&code.to_be_bytes());
    frame(FRAME_GOAWAY, 0, 0, &payload)
}

fn read_exact(session: &mut dyn SessionOps, buf: &mut [u8]) -> bool {
    let mut filled = 0;
    while filled < buf.len() {
        match session.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => return false,
            Ok(n) => filled += n,
        }
    }
    true
}

fn write_all(session: &mut dyn SessionOps, mut bytes: &[u8]) -> bool {
    while !bytes.is_empty() {
        match session.write(bytes) {
            Ok(0) | Err(_) => return false,
            Ok(n) => bytes = &bytes[n..],
        }
    }
    true
}

/// One received frame: type, flags, stream id, payload.
pub type MockFrame = (u8, u8, u32, Vec<u8>);

pub fn read_frame(session: &mut dyn SessionOps) -> Option<MockFrame> {
    let mut header = [0u8; 9];
    if !read_exact(session, &mut header) {
        return None;
    }
    let len = (header[0] as usize) << 16 | (header[1] as usize) << 8 | header[2] as usize;
    let stream = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) & 0x7fff_ffff;
    let mut payload = vec![0u8; len];
    if !read_exact(session, &mut payload) {
        return None;
    }
    Some((header[3], header[4], stream, payload))
}

/// How the HTTP/2 mock treats its client.
#[derive(Debug, Clone)]
pub struct H2Behaviour {
    pub settings: Vec<(u16, u32)>,
    /// Send GOAWAY after this many RST_STREAM frames.
    pub goaway_after_resets: Option<usize>,
    /// Answer every HEADERS with `:status 200` and END_STREAM.
    pub respond: bool,
}

impl Default for H2Behaviour {
    fn default() -> Self {
        H2Behaviour {
            settings: vec![(0x1, 4096), (0x6, 16384)],
            goaway_after_resets: Some(100),
            respond: true,
        }
    }
}

/// Serve one HTTP/2 connection with prior knowledge.
pub fn serve_h2(session: &mut dyn SessionOps, behaviour: &H2Behaviour) {
    let mut preface = [0u8; 24];
    if !read_exact(session, &mut preface) || &preface[..] != b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n" {
        return;
    }
    if !write_all(session, &settings(&behaviour.settings)) {
        return;
    }

    let mut resets = 0;
    let mut last_stream = 0;
    while let Some((kind, flags, stream, payload)) = read_frame(session) {
        let reply = match kind {
            FRAME_SETTINGS if flags & 0x1 == 0 => frame(FRAME_SETTINGS, 0x1, 0, &[]),
            FRAME_PING if flags & 0x1 == 0 => frame(FRAME_PING, 0x1, 0, &payload),
            FRAME_HEADERS => {
                last_stream = stream;
                if behaviour.respond {
                    // Indexed `:status 200`, END_STREAM | END_HEADERS.
                    frame(FRAME_HEADERS, 0x5, stream, &[0x88])
                } else {
                    continue;
                }
            }
            FRAME_RST_STREAM => {
                resets += 1;
                if behaviour.goaway_after_resets == Some(resets) {
                    // ENHANCE_YOUR_CALM
                    let _ = write_all(session, &goaway(last_stream, 0xb));
                    drain(session);
                    return;
                }
                continue;
            }
            FRAME_DATA | FRAME_GOAWAY => continue,
            _ => continue,
        };
        if !write_all(session, &reply) {
            return;
        }
    }
}

fn drain(session: &mut dyn SessionOps) {
    let mut sink = [0u8; 4096];
    loop {
        match session.poll(vharness::net::PollEvents::Read, Some(Duration::from_secs(2))) {
            Ok(true) => match session.read(&mut sink) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            },
            _ => return,
        }
    }
}
