//! Response predicates
//!
//! A [`Check`] is a pure function of an [`Observation`]: whatever the
//! connection produced after a request, whether a parsed response, a
//! framing condition raised by the reader, or a transport outcome. Checks
//! compose with [`Check::any_of`], [`Check::all_of`], [`Check::not`] and
//! [`Check::soft`]; where a server may legitimately answer in more than one
//! way the accepted answers are spelled out as an OR-predicate.

use super::step::StreamRef;
use super::verdict::{Judgement, Outcome};
use crate::http::h2::{ErrorCode, Http2Event, SettingsMap, SettingsParameter};
use crate::http::{Framing, HttpResponse, ReaderState, ResponseHead};
use std::fmt;
use std::sync::Arc;

/// What came back after a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Response(HttpResponse),
    Malformed(String),
    AmbiguousFraming(ResponseHead),
    ConflictingContentLength(ResponseHead),
    /// Peer closed the connection before a complete response.
    Closed { bytes_received: usize },
    Reset,
    /// Nothing conclusive arrived before the deadline.
    TimedOut { bytes_received: usize },
}

impl Observation {
    /// Map a terminal reader state. Non-terminal states map to `None`.
    pub fn from_reader(state: ReaderState) -> Option<Self> {
        match state {
            ReaderState::Complete(response) => Some(Observation::Response(response)),
            ReaderState::Malformed(reason) => Some(Observation::Malformed(reason)),
            ReaderState::AmbiguousFraming(head) => Some(Observation::AmbiguousFraming(head)),
            ReaderState::ConflictingContentLength(head) => Some(Observation::ConflictingContentLength(head)),
            ReaderState::NeedMoreHeaderBytes | ReaderState::NeedMoreBodyBytes(_) => None,
        }
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Observation::Response(response) => Some(response),
            _ => None,
        }
    }

    /// Status line and headers, when at least those were parsed.
    pub fn head(&self) -> Option<&ResponseHead> {
        match self {
            Observation::Response(response) => Some(response.head()),
            Observation::AmbiguousFraming(head) | Observation::ConflictingContentLength(head) => Some(head),
            _ => None,
        }
    }

    /// Whether the connection ended without the server finishing a reply.
    pub fn is_connection_end(&self) -> bool {
        matches!(self, Observation::Closed { .. } | Observation::Reset)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Response(response) => write!(f, "{}", response),
            Observation::Malformed(reason) => write!(f, "malformed response ({})", reason),
            Observation::AmbiguousFraming(head) => {
                write!(f, "{} with both Content-Length and Transfer-Encoding", head)
            }
            Observation::ConflictingContentLength(head) => write!(f, "{} with conflicting Content-Length", head),
            Observation::Closed { bytes_received: 0 } => f.write_str("connection closed without a response"),
            Observation::Closed { bytes_received } => {
                write!(f, "connection closed after {} response bytes", bytes_received)
            }
            Observation::Reset => f.write_str("connection reset"),
            Observation::TimedOut { bytes_received } => {
                write!(f, "no complete response before the deadline ({} bytes)", bytes_received)
            }
        }
    }
}

/// Reader conditions a check can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Malformed,
    AmbiguousFraming,
    ConflictingContentLength,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::Malformed => "malformed response",
            Condition::AmbiguousFraming => "ambiguous framing",
            Condition::ConflictingContentLength => "conflicting Content-Length",
        })
    }
}

type Predicate = Arc<dyn Fn(&Observation) -> Judgement + Send + Sync>;

/// Predicate over an [`Observation`].
#[derive(Clone)]
pub enum Check {
    /// Any complete response.
    Responded,
    Status(u16),
    StatusIn(Vec<u16>),
    /// First digit of the status, e.g. `4` for 4xx.
    StatusClass(u16),
    HeaderPresent(String),
    HeaderAbsent(String),
    HeaderEquals(String, String),
    /// Case-insensitive substring of the header value.
    HeaderContains(String, String),
    BodyLength(usize),
    BodyContains(String),
    /// Case-insensitive text anywhere in the head or body.
    Mentions(String),
    Framing(Framing),
    Condition(Condition),
    /// Closed or reset without a complete response.
    ConnectionClosed,
    NoResponse,
    /// Same status and body as the response observed by the previous
    /// expectation in the scenario.
    SameAsPrevious,
    AnyOf(Vec<Check>),
    AllOf(Vec<Check>),
    Not(Box<Check>),
    Soft(Box<Check>),
    Custom { description: String, predicate: Predicate },
}

impl Check {
    pub fn status(code: u16) -> Self {
        Check::Status(code)
    }

    pub fn status_in(codes: impl IntoIterator<Item = u16>) -> Self {
        Check::StatusIn(codes.into_iter().collect())
    }

    pub fn status_class(class: u16) -> Self {
        Check::StatusClass(class)
    }

    pub fn header_present(name: impl Into<String>) -> Self {
        Check::HeaderPresent(name.into())
    }

    pub fn header_absent(name: impl Into<String>) -> Self {
        Check::HeaderAbsent(name.into())
    }

    pub fn header_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Check::HeaderEquals(name.into(), value.into())
    }

    pub fn header_contains(name: impl Into<String>, needle: impl Into<String>) -> Self {
        Check::HeaderContains(name.into(), needle.into())
    }

    pub fn body_length(len: usize) -> Self {
        Check::BodyLength(len)
    }

    pub fn body_contains(needle: impl Into<String>) -> Self {
        Check::BodyContains(needle.into())
    }

    pub fn mentions(needle: impl Into<String>) -> Self {
        Check::Mentions(needle.into())
    }

    pub fn same_as_previous() -> Self {
        Check::SameAsPrevious
    }

    pub fn any_of(checks: impl IntoIterator<Item = Check>) -> Self {
        Check::AnyOf(checks.into_iter().collect())
    }

    pub fn all_of(checks: impl IntoIterator<Item = Check>) -> Self {
        Check::AllOf(checks.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(check: Check) -> Self {
        Check::Not(Box::new(check))
    }

    pub fn custom<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Observation) -> Judgement + Send + Sync + 'static,
    {
        Check::Custom {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Failures of this check are reported as INCONCLUSIVE.
    pub fn soft(self) -> Self {
        Check::Soft(Box::new(self))
    }

    pub fn and(self, other: Check) -> Self {
        match self {
            Check::AllOf(mut checks) => {
                checks.push(other);
                Check::AllOf(checks)
            }
            check => Check::AllOf(vec![check, other]),
        }
    }

    pub fn or(self, other: Check) -> Self {
        match self {
            Check::AnyOf(mut checks) => {
                checks.push(other);
                Check::AnyOf(checks)
            }
            check => Check::AnyOf(vec![check, other]),
        }
    }

    /// `206` whose `Content-Length` and body both have `len` bytes.
    pub fn partial_content(len: usize) -> Self {
        Check::all_of([
            Check::status(206),
            Check::header_equals("Content-Length", len.to_string()),
            Check::body_length(len),
        ])
    }

    /// `416` carrying a `Content-Range` header.
    pub fn range_not_satisfiable() -> Self {
        Check::all_of([Check::status(416), Check::header_present("Content-Range")])
    }

    pub fn evaluate(&self, observation: &Observation) -> Judgement {
        self.evaluate_after(observation, None)
    }

    /// Judge `observation`, with `previous` being what the scenario's
    /// preceding expectation saw.
    pub fn evaluate_after(&self, observation: &Observation, previous: Option<&Observation>) -> Judgement {
        match self {
            Check::Responded => match observation {
                Observation::Response(_) => Judgement::pass(observation.to_string()),
                other => Judgement::fail(format!("expected a response, got {}", other)),
            },
            Check::Status(code) => status_check(observation, &format!("status {}", code), |s| s == *code),
            Check::StatusIn(codes) => {
                let expected = codes.iter().map(u16::to_string).collect::<Vec<_>>().join("|");
                status_check(observation, &format!("status {}", expected), |s| codes.contains(&s))
            }
            Check::StatusClass(class) => {
                status_check(observation, &format!("status {}xx", class), |s| s / 100 == *class)
            }
            Check::HeaderPresent(name) => head_check(observation, |head| match head.headers.get(name) {
                Some(value) => Judgement::pass(format!("{}: {}", name, value)),
                None => Judgement::fail(format!("{} header missing", name)),
            }),
            Check::HeaderAbsent(name) => head_check(observation, |head| match head.headers.get(name) {
                Some(value) => Judgement::fail(format!("unexpected {}: {}", name, value)),
                None => Judgement::pass(format!("no {} header", name)),
            }),
            Check::HeaderEquals(name, expected) => head_check(observation, |head| {
                match head.headers.get(name) {
                    Some(value) if value.eq_ignore_ascii_case(expected) => {
                        Judgement::pass(format!("{}: {}", name, value))
                    }
                    Some(value) => Judgement::fail(format!("{}: {} (expected {})", name, value, expected)),
                    None => Judgement::fail(format!("{} header missing", name)),
                }
            }),
            Check::HeaderContains(name, needle) => head_check(observation, |head| {
                let lower = needle.to_ascii_lowercase();
                let values = head.headers.get_all(name);
                if values.iter().any(|v| v.to_ascii_lowercase().contains(&lower)) {
                    Judgement::pass(format!("{} contains {:?}", name, needle))
                } else if values.is_empty() {
                    Judgement::fail(format!("{} header missing", name))
                } else {
                    Judgement::fail(format!("{}: {} (no {:?})", name, values.join(", "), needle))
                }
            }),
            Check::BodyLength(len) => response_check(observation, |r| {
                if r.body().len() == *len {
                    Judgement::pass(format!("{} body bytes", len))
                } else {
                    Judgement::fail(format!("{} body bytes, expected {}", r.body().len(), len))
                }
            }),
            Check::BodyContains(needle) => response_check(observation, |r| {
                if r.body_text().contains(needle.as_str()) {
                    Judgement::pass(format!("body contains {:?}", needle))
                } else {
                    Judgement::fail(format!("body lacks {:?}", needle))
                }
            }),
            Check::Mentions(needle) => response_check(observation, |r| {
                if r.mentions(needle) {
                    Judgement::pass(format!("response mentions {:?}", needle))
                } else {
                    Judgement::fail(format!("{} does not mention {:?}", r.head(), needle))
                }
            }),
            Check::Framing(expected) => response_check(observation, |r| {
                if r.framing() == *expected {
                    Judgement::pass(format!("framed as {}", expected))
                } else {
                    Judgement::fail(format!("framed as {}, expected {}", r.framing(), expected))
                }
            }),
            Check::Condition(condition) => {
                let matched = matches!(
                    (condition, observation),
                    (Condition::Malformed, Observation::Malformed(_))
                        | (Condition::AmbiguousFraming, Observation::AmbiguousFraming(_))
                        | (Condition::ConflictingContentLength, Observation::ConflictingContentLength(_))
                );
                if matched {
                    Judgement::pass(observation.to_string())
                } else {
                    Judgement::fail(format!("expected {}, got {}", condition, observation))
                }
            }
            Check::ConnectionClosed => {
                if observation.is_connection_end() {
                    Judgement::pass(observation.to_string())
                } else {
                    Judgement::fail(format!("expected the connection to close, got {}", observation))
                }
            }
            Check::NoResponse => match observation {
                Observation::TimedOut { .. } | Observation::Closed { bytes_received: 0 } | Observation::Reset => {
                    Judgement::pass(observation.to_string())
                }
                other => Judgement::fail(format!("expected no response, got {}", other)),
            },
            Check::SameAsPrevious => same_as(observation, previous),
            Check::AnyOf(checks) => any_of(checks.iter().map(|c| c.evaluate_after(observation, previous))),
            Check::AllOf(checks) => all_of(checks.iter().map(|c| c.evaluate_after(observation, previous))),
            Check::Not(check) => {
                let inner = check.evaluate_after(observation, previous);
                match inner.outcome {
                    Outcome::Pass => Judgement::fail(format!("not expected: {}", inner.reason)),
                    Outcome::Fail => Judgement::pass(inner.reason),
                    Outcome::Inconclusive => inner,
                }
            }
            Check::Soft(check) => check.evaluate_after(observation, previous).soften(),
            Check::Custom { predicate, .. } => predicate(observation),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Custom { description, .. } => f.debug_tuple("Custom").field(description).finish(),
            Check::AnyOf(checks) => f.debug_tuple("AnyOf").field(checks).finish(),
            Check::AllOf(checks) => f.debug_tuple("AllOf").field(checks).finish(),
            Check::Not(check) => f.debug_tuple("Not").field(check).finish(),
            Check::Soft(check) => f.debug_tuple("Soft").field(check).finish(),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Responded => f.write_str("any response"),
            Check::Status(code) => write!(f, "status {}", code),
            Check::StatusIn(codes) => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                write!(f, "status {}", codes.join("|"))
            }
            Check::StatusClass(class) => write!(f, "status {}xx", class),
            Check::HeaderPresent(name) => write!(f, "{} present", name),
            Check::HeaderAbsent(name) => write!(f, "{} absent", name),
            Check::HeaderEquals(name, value) => write!(f, "{}: {}", name, value),
            Check::HeaderContains(name, needle) => write!(f, "{} contains {:?}", name, needle),
            Check::BodyLength(len) => write!(f, "{} body bytes", len),
            Check::BodyContains(needle) => write!(f, "body contains {:?}", needle),
            Check::Mentions(needle) => write!(f, "mentions {:?}", needle),
            Check::Framing(framing) => write!(f, "framed as {}", framing),
            Check::Condition(condition) => write!(f, "{}", condition),
            Check::ConnectionClosed => f.write_str("connection closed"),
            Check::NoResponse => f.write_str("no response"),
            Check::SameAsPrevious => f.write_str("same as the previous response"),
            Check::AnyOf(checks) => join(f, checks, " or "),
            Check::AllOf(checks) => join(f, checks, " and "),
            Check::Not(check) => write!(f, "not ({})", check),
            Check::Soft(check) => write!(f, "{} (soft)", check),
            Check::Custom { description, .. } => f.write_str(description),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, checks: &[Check], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, check) in checks.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", check)?;
    }
    f.write_str(")")
}

fn status_check(observation: &Observation, expected: &str, accept: impl Fn(u16) -> bool) -> Judgement {
    match observation.head() {
        Some(head) if accept(head.status) => Judgement::pass(format!("{} {}", head.status, head.reason)),
        Some(head) => Judgement::fail(format!("expected {}, got {} {}", expected, head.status, head.reason)),
        None => Judgement::fail(format!("expected {}, got {}", expected, observation)),
    }
}

fn head_check(observation: &Observation, check: impl Fn(&ResponseHead) -> Judgement) -> Judgement {
    match observation.head() {
        Some(head) => check(head),
        None => Judgement::fail(format!("no response head: {}", observation)),
    }
}

fn response_check(observation: &Observation, check: impl Fn(&HttpResponse) -> Judgement) -> Judgement {
    match observation.response() {
        Some(response) => check(response),
        None => Judgement::fail(format!("no complete response: {}", observation)),
    }
}

fn same_as(observation: &Observation, previous: Option<&Observation>) -> Judgement {
    let earlier = match previous {
        Some(Observation::Response(earlier)) => earlier,
        Some(other) => return Judgement::fail(format!("previous expectation saw {}", other)),
        None => return Judgement::inconclusive("no earlier response to compare with"),
    };
    response_check(observation, |r| {
        if r.status() != earlier.status() {
            Judgement::fail(format!("status {} after {}", r.status(), earlier.status()))
        } else if r.body() != earlier.body() {
            Judgement::fail(format!(
                "body differs from the previous response ({} vs {} bytes)",
                r.body().len(),
                earlier.body().len()
            ))
        } else {
            Judgement::pass(format!("status {} and {} body bytes repeated", r.status(), r.body().len()))
        }
    })
}

/// OR-combination: the first PASS wins; otherwise INCONCLUSIVE if any
/// branch was, else FAIL with every reason.
pub(crate) fn any_of(judgements: impl Iterator<Item = Judgement>) -> Judgement {
    let mut inconclusive = None;
    let mut reasons = Vec::new();
    for j in judgements {
        match j.outcome {
            Outcome::Pass => return j,
            Outcome::Inconclusive => {
                if inconclusive.is_none() {
                    inconclusive = Some(j);
                }
            }
            Outcome::Fail => reasons.push(j.reason),
        }
    }
    match inconclusive {
        Some(j) => j,
        None if reasons.is_empty() => Judgement::fail("no alternative accepted"),
        None => Judgement::fail(reasons.join("; ")),
    }
}

/// AND-combination: the first FAIL wins; otherwise INCONCLUSIVE if any
/// part was, else PASS with every reason.
pub(crate) fn all_of(judgements: impl Iterator<Item = Judgement>) -> Judgement {
    let mut inconclusive = None;
    let mut reasons = Vec::new();
    for j in judgements {
        match j.outcome {
            Outcome::Fail => return j,
            Outcome::Inconclusive => {
                if inconclusive.is_none() {
                    inconclusive = Some(j);
                }
            }
            Outcome::Pass => reasons.push(j.reason),
        }
    }
    match inconclusive {
        Some(j) => j,
        None => Judgement::pass(reasons.join("; ")),
    }
}

/// An HTTP/2 event together with the number of resets sent before it was
/// observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub event: Http2Event,
    pub resets_sent: u64,
}

/// Every event seen on one HTTP/2 connection, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LoggedEvent>,
    closed_after: Option<u64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Http2Event, resets_sent: u64) {
        self.entries.push(LoggedEvent { event, resets_sent });
    }

    /// Record that the transport ended.
    pub fn mark_closed(&mut self, resets_sent: u64) {
        if self.closed_after.is_none() {
            self.closed_after = Some(resets_sent);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_after.is_some()
    }

    pub fn entries(&self) -> &[LoggedEvent] {
        &self.entries
    }

    pub fn events(&self) -> impl Iterator<Item = &Http2Event> {
        self.entries.iter().map(|e| &e.event)
    }

    /// First GOAWAY, or the transport close if no GOAWAY arrived, with the
    /// resets sent by then.
    pub fn termination(&self) -> Option<(u64, String)> {
        self.entries
            .iter()
            .find(|e| matches!(e.event, Http2Event::ConnectionTerminated { .. }))
            .map(|e| (e.resets_sent, e.event.to_string()))
            .or_else(|| self.closed_after.map(|r| (r, "connection closed".to_string())))
    }

    fn first_settings(&self) -> Option<&SettingsMap> {
        self.events().find_map(|e| match e {
            Http2Event::SettingsReceived(settings) => Some(settings),
            _ => None,
        })
    }

    fn status_on(&self, stream_id: u32) -> Option<u16> {
        self.events().find_map(|e| match e {
            Http2Event::HeadersReceived {
                stream_id: id,
                status: Some(status),
                ..
            } if *id == stream_id => Some(*status),
            _ => None,
        })
    }

    fn reset_of(&self, stream_id: u32) -> Option<ErrorCode> {
        self.events().find_map(|e| match e {
            Http2Event::StreamReset { stream_id: id, error_code } if *id == stream_id => Some(*error_code),
            _ => None,
        })
    }
}

/// Connection facts an event check may refer to.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventContext {
    pub last_stream_id: u32,
    pub resets_sent: u64,
}

/// Predicate over an HTTP/2 event sequence.
///
/// Checks are decided incrementally: [`EventCheck::evaluate`] returns
/// `None` while more events could still change the answer, and always
/// returns a judgement once `last_call` is set at the deadline or when the
/// connection has ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EventCheck {
    SettingsReceived,
    /// The advertised value, or the protocol default, must not exceed the
    /// limit. An unbounded default fails.
    SettingAtMost(SettingsParameter, u32),
    SettingPresent(SettingsParameter),
    Status { stream: StreamRef, status: u16 },
    StatusClass { stream: StreamRef, class: u16 },
    StreamEnded(StreamRef),
    /// GOAWAY or close no later than the given number of resets. A later
    /// termination is INCONCLUSIVE, none at all is FAIL.
    TerminatedWithinResets(u64),
    /// GOAWAY, close, or RST_STREAM on any stream.
    TerminatedOrReset,
    NoTermination,
    AnyOf(Vec<EventCheck>),
    AllOf(Vec<EventCheck>),
    Soft(Box<EventCheck>),
}

impl EventCheck {
    pub fn any_of(checks: impl IntoIterator<Item = EventCheck>) -> Self {
        EventCheck::AnyOf(checks.into_iter().collect())
    }

    pub fn all_of(checks: impl IntoIterator<Item = EventCheck>) -> Self {
        EventCheck::AllOf(checks.into_iter().collect())
    }

    pub fn soft(self) -> Self {
        EventCheck::Soft(Box::new(self))
    }

    pub fn evaluate(&self, log: &EventLog, ctx: &EventContext, last_call: bool) -> Option<Judgement> {
        let undecided = |reason: String| {
            if last_call {
                Some(Judgement::fail(reason))
            } else {
                None
            }
        };

        match self {
            EventCheck::SettingsReceived => match log.first_settings() {
                Some(settings) => Some(Judgement::pass(format!("SETTINGS {}", settings))),
                None => undecided("no SETTINGS from server".to_string()),
            },
            EventCheck::SettingAtMost(param, max) => match log.first_settings() {
                Some(settings) => Some(match settings.effective(*param) {
                    Some(value) if value <= *max => Judgement::pass(format!("{} = {}", param.name(), value)),
                    Some(value) => Judgement::fail(format!("{} = {} exceeds {}", param.name(), value, max)),
                    None => Judgement::fail(format!("{} not advertised (unbounded)", param.name())),
                }),
                None => undecided("no SETTINGS from server".to_string()),
            },
            EventCheck::SettingPresent(param) => match log.first_settings() {
                Some(settings) => Some(match settings.get(*param) {
                    Some(value) => Judgement::pass(format!("{} = {}", param.name(), value)),
                    None => Judgement::fail(format!("{} not advertised", param.name())),
                }),
                None => undecided("no SETTINGS from server".to_string()),
            },
            EventCheck::Status { stream, status } => {
                let id = stream.resolve(ctx.last_stream_id);
                stream_status(log, id, &format!("status {}", status), |s| s == *status, last_call)
            }
            EventCheck::StatusClass { stream, class } => {
                let id = stream.resolve(ctx.last_stream_id);
                stream_status(log, id, &format!("status {}xx", class), |s| s / 100 == *class, last_call)
            }
            EventCheck::StreamEnded(stream) => {
                let id = stream.resolve(ctx.last_stream_id);
                if log.events().any(|e| *e == Http2Event::StreamEnded(id)) {
                    Some(Judgement::pass(format!("stream {} ended", id)))
                } else if let Some(code) = log.reset_of(id) {
                    Some(Judgement::fail(format!("stream {} reset with {}", id, code)))
                } else if let Some((_, what)) = log.termination() {
                    Some(Judgement::fail(format!("stream {} never ended: {}", id, what)))
                } else {
                    undecided(format!("stream {} never ended", id))
                }
            }
            EventCheck::TerminatedWithinResets(limit) => match log.termination() {
                Some((resets, what)) if resets <= *limit => {
                    Some(Judgement::pass(format!("{} after {} resets", what, resets)))
                }
                Some((resets, what)) => Some(Judgement::inconclusive(format!(
                    "{} only after {} resets (limit {})",
                    what, resets, limit
                ))),
                None => undecided(format!("no termination after {} resets", ctx.resets_sent)),
            },
            EventCheck::TerminatedOrReset => {
                if let Some((_, what)) = log.termination() {
                    Some(Judgement::pass(what))
                } else if let Some(event) = log.events().find(|e| matches!(e, Http2Event::StreamReset { .. })) {
                    Some(Judgement::pass(event.to_string()))
                } else {
                    undecided("connection neither terminated nor reset".to_string())
                }
            }
            EventCheck::NoTermination => match log.termination() {
                Some((_, what)) => Some(Judgement::fail(format!("unexpected {}", what))),
                None if last_call => Some(Judgement::pass("connection still open")),
                None => None,
            },
            EventCheck::AnyOf(checks) => {
                let results: Vec<Option<Judgement>> =
                    checks.iter().map(|c| c.evaluate(log, ctx, last_call)).collect();
                if let Some(pass) = results.iter().flatten().find(|j| j.is_pass()) {
                    return Some(pass.clone());
                }
                if results.iter().all(Option::is_some) {
                    Some(any_of(results.into_iter().flatten()))
                } else {
                    None
                }
            }
            EventCheck::AllOf(checks) => {
                let results: Vec<Option<Judgement>> =
                    checks.iter().map(|c| c.evaluate(log, ctx, last_call)).collect();
                if let Some(fail) = results.iter().flatten().find(|j| j.is_fail()) {
                    return Some(fail.clone());
                }
                if results.iter().all(Option::is_some) {
                    Some(all_of(results.into_iter().flatten()))
                } else {
                    None
                }
            }
            EventCheck::Soft(check) => check.evaluate(log, ctx, last_call).map(Judgement::soften),
        }
    }
}

fn stream_status(
    log: &EventLog,
    stream_id: u32,
    expected: &str,
    accept: impl Fn(u16) -> bool,
    last_call: bool,
) -> Option<Judgement> {
    if let Some(status) = log.status_on(stream_id) {
        return Some(if accept(status) {
            Judgement::pass(format!("stream {} :status {}", stream_id, status))
        } else {
            Judgement::fail(format!("expected {} on stream {}, got {}", expected, stream_id, status))
        });
    }
    if let Some(code) = log.reset_of(stream_id) {
        return Some(Judgement::fail(format!(
            "expected {} on stream {}, got RST_STREAM {}",
            expected, stream_id, code
        )));
    }
    if let Some((_, what)) = log.termination() {
        return Some(Judgement::fail(format!("expected {} on stream {}, got {}", expected, stream_id, what)));
    }
    if last_call {
        Some(Judgement::fail(format!("expected {} on stream {}, got nothing", expected, stream_id)))
    } else {
        None
    }
}

impl fmt::Display for EventCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCheck::SettingsReceived => f.write_str("SETTINGS"),
            EventCheck::SettingAtMost(param, max) => write!(f, "{} <= {}", param.name(), max),
            EventCheck::SettingPresent(param) => write!(f, "{} advertised", param.name()),
            EventCheck::Status { stream, status } => write!(f, ":status {} on {}", status, stream),
            EventCheck::StatusClass { stream, class } => write!(f, ":status {}xx on {}", class, stream),
            EventCheck::StreamEnded(stream) => write!(f, "END_STREAM on {}", stream),
            EventCheck::TerminatedWithinResets(limit) => write!(f, "termination within {} resets", limit),
            EventCheck::TerminatedOrReset => f.write_str("GOAWAY or RST_STREAM"),
            EventCheck::NoTermination => f.write_str("no termination"),
            EventCheck::AnyOf(checks) => join_events(f, checks, " or "),
            EventCheck::AllOf(checks) => join_events(f, checks, " and "),
            EventCheck::Soft(check) => write!(f, "{} (soft)", check),
        }
    }
}

fn join_events(f: &mut fmt::Formatter<'_>, checks: &[EventCheck], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, check) in checks.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", check)?;
    }
    f.write_str(")")
}
