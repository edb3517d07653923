//! Scenario description
//!
//! Scenarios are plain data: a name, the protocol and transport to use, and
//! an ordered list of [`Step`]s. Nothing here performs I/O; see
//! [`ScenarioRunner`](super::ScenarioRunner).

use super::check::{Check, EventCheck};
use super::timing::TimingCheck;
use crate::http::h2::ErrorCode;
use crate::http::RawRequest;
use crate::net::PacingPolicy;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    Tls,
}

/// How response bytes are pulled off the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Read whatever is available as soon as it arrives.
    #[default]
    Eager,
    /// Read at most `bytes` at a time with `delay` in between.
    Paced { bytes: usize, delay: Duration },
}

/// Stream a frame action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRef {
    /// Most recently opened stream.
    Last,
    Id(u32),
}

impl StreamRef {
    pub fn resolve(self, last: u32) -> u32 {
        match self {
            StreamRef::Last => last,
            StreamRef::Id(id) => id,
        }
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRef::Last => f.write_str("last stream"),
            StreamRef::Id(id) => write!(f, "stream {}", id),
        }
    }
}

/// HTTP/2 frames a step can send.
#[derive(Debug, Clone)]
pub enum FrameAction {
    /// Preface and SETTINGS, then wait for the server's SETTINGS.
    Initiate,
    OpenStream {
        headers: Vec<(String, String)>,
        end_stream: bool,
    },
    /// HEADERS carrying a pre-encoded header block.
    OpenStreamRaw { block: Vec<u8>, end_stream: bool },
    Data {
        stream: StreamRef,
        payload: Vec<u8>,
        end_stream: bool,
    },
    Reset { stream: StreamRef, code: ErrorCode },
    Goaway(ErrorCode),
}

impl fmt::Display for FrameAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameAction::Initiate => f.write_str("preface + SETTINGS"),
            FrameAction::OpenStream { headers, .. } => {
                let path = headers
                    .iter()
                    .find(|(n, _)| n == ":path")
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("?");
                write!(f, "HEADERS {}", path)
            }
            FrameAction::OpenStreamRaw { block, .. } => write!(f, "HEADERS ({} byte block)", block.len()),
            FrameAction::Data { stream, payload, .. } => write!(f, "DATA {} ({} bytes)", stream, payload.len()),
            FrameAction::Reset { stream, code } => write!(f, "RST_STREAM {} {}", stream, code),
            FrameAction::Goaway(code) => write!(f, "GOAWAY {}", code),
        }
    }
}

/// Where the window of [`Step::ExpectClose`] starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseAnchor {
    /// First byte of the last send; header timeouts run from here.
    #[default]
    FirstByte,
    /// Last byte of the last send, after which the client is silent.
    LastByte,
}

impl fmt::Display for CloseAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseAnchor::FirstByte => "first byte",
            CloseAnchor::LastByte => "last byte",
        })
    }
}

/// One scenario step.
#[derive(Debug, Clone)]
pub enum Step {
    SendRequest {
        request: RawRequest,
        pacing: PacingPolicy,
    },
    ExpectResponse {
        check: Check,
        read: ReadPolicy,
    },
    SendFrame(FrameAction),
    ExpectEvent(EventCheck),
    /// Pause the whole scenario.
    Wait(Duration),
    /// Drop the connection and open a fresh one.
    Reconnect,
    /// The peer must close the connection between `not_before` and
    /// `within`, measured from `from` of the last send.
    ExpectClose {
        not_before: Duration,
        within: Duration,
        from: CloseAnchor,
    },
    Repeat {
        times: usize,
        steps: Vec<Step>,
    },
    /// Time `samples` round trips of `request`, each on a new connection.
    MeasureLatency {
        label: String,
        request: RawRequest,
        samples: usize,
    },
    ExpectTiming(TimingCheck),
}

impl Step {
    pub fn send(request: RawRequest) -> Self {
        Step::SendRequest {
            request,
            pacing: PacingPolicy::Immediate,
        }
    }

    pub fn send_paced(request: RawRequest, pacing: PacingPolicy) -> Self {
        Step::SendRequest { request, pacing }
    }

    pub fn expect(check: Check) -> Self {
        Step::ExpectResponse {
            check,
            read: ReadPolicy::Eager,
        }
    }

    pub fn open_stream(headers: Vec<(String, String)>, end_stream: bool) -> Self {
        Step::SendFrame(FrameAction::OpenStream { headers, end_stream })
    }

    pub fn reset(stream: StreamRef, code: ErrorCode) -> Self {
        Step::SendFrame(FrameAction::Reset { stream, code })
    }

    /// Short description used in step records.
    pub fn label(&self) -> String {
        match self {
            Step::SendRequest { request, pacing } => {
                let first_line = request.head().split(|&b| b == b'\r').next().unwrap_or_default();
                let mut label = format!("send {}", String::from_utf8_lossy(first_line));
                if label.len() > 60 {
                    let mut cut = 60;
                    while !label.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    label.truncate(cut);
                    label.push_str("...");
                }
                if *pacing != PacingPolicy::Immediate {
                    label.push_str(&format!(" [{:?}]", pacing));
                }
                label
            }
            Step::ExpectResponse { check, .. } => format!("expect {}", check),
            Step::SendFrame(action) => format!("frame {}", action),
            Step::ExpectEvent(check) => format!("expect {}", check),
            Step::Wait(d) => format!("wait {:?}", d),
            Step::Reconnect => "reconnect".to_string(),
            Step::ExpectClose { not_before, within, from } => {
                format!("expect close {:?}..{:?} after the {}", not_before, within, from)
            }
            Step::Repeat { times, steps } => format!("repeat {}x {} steps", times, steps.len()),
            Step::MeasureLatency { label, samples, .. } => format!("measure {} x{}", label, samples),
            Step::ExpectTiming(check) => format!("expect {}", check),
        }
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub protocol: Protocol,
    pub transport: Transport,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn http1(name: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            protocol: Protocol::Http1,
            transport: Transport::Plain,
            steps: Vec::new(),
        }
    }

    pub fn http2(name: impl Into<String>) -> Self {
        Scenario {
            name: name.into(),
            protocol: Protocol::Http2,
            transport: Transport::Tls,
            steps: Vec::new(),
        }
    }

    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Shorthand for a request followed by a check on its response.
    pub fn request(self, request: RawRequest, check: Check) -> Self {
        self.step(Step::send(request)).step(Step::expect(check))
    }
}

/// Sub-scenario of a [`ParallelScenario`].
#[derive(Debug, Clone)]
pub struct Branch {
    pub scenario: Scenario,
    /// Best-effort branches can only downgrade the result to INCONCLUSIVE.
    pub mandatory: bool,
}

/// Branches started together behind one barrier, each on its own
/// connection and thread.
#[derive(Debug, Clone)]
pub struct ParallelScenario {
    pub name: String,
    pub branches: Vec<Branch>,
}

impl ParallelScenario {
    pub fn new(name: impl Into<String>) -> Self {
        ParallelScenario {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    pub fn mandatory(mut self, scenario: Scenario) -> Self {
        self.branches.push(Branch {
            scenario,
            mandatory: true,
        });
        self
    }

    pub fn best_effort(mut self, scenario: Scenario) -> Self {
        self.branches.push(Branch {
            scenario,
            mandatory: false,
        });
        self
    }
}

/// Anything the runner can execute.
#[derive(Debug, Clone)]
pub enum Case {
    Single(Scenario),
    Parallel(ParallelScenario),
}

impl Case {
    pub fn name(&self) -> &str {
        match self {
            Case::Single(s) => &s.name,
            Case::Parallel(p) => &p.name,
        }
    }
}

impl From<Scenario> for Case {
    fn from(scenario: Scenario) -> Self {
        Case::Single(scenario)
    }
}

impl From<ParallelScenario> for Case {
    fn from(parallel: ParallelScenario) -> Self {
        Case::Parallel(parallel)
    }
}
