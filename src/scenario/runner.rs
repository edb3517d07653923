//! Scenario execution
//!
//! [`ScenarioRunner`] walks a scenario's steps in order on one connection,
//! turning every transport and parsing condition into an observation that
//! the step's predicate judges. The first FAIL ends the scenario; setup
//! problems (target unreachable, no SETTINGS) end it as INCONCLUSIVE.
//!
//! Parallel scenarios run each branch on its own thread. All branches wait
//! on one barrier and report back over a channel.

use super::check::{Check, EventCheck, EventContext, EventLog, Observation};
use super::step::{Case, CloseAnchor, FrameAction, ParallelScenario, Protocol, ReadPolicy, Scenario, Step, Transport};
use super::timing::{self, Samples};
use super::verdict::{aggregate, Counters, Judgement, Outcome, ScenarioReport, StepRecord, Verdict};
use crate::config::HarnessConfig;
use crate::http::h2::{self, ClientState, Http2Event, Http2FrameClient, ALPN_H2};
use crate::http::{Http1ResponseReader, HttpResponse, RawRequest, ReaderState};
use crate::net::{self, Connection, PacingPolicy, Target};
use std::sync::{mpsc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 16 * 1024;

/// Executes scenarios against the configured target.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    pub fn new(config: HarnessConfig) -> Self {
        ScenarioRunner { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn run(&self, scenario: &Scenario) -> ScenarioReport {
        tracing::debug!(scenario = %scenario.name, steps = scenario.steps.len(), "scenario start");

        let mut execution = Execution::new(&self.config, scenario);
        let verdict = execution.run();
        execution.disconnect();

        let report = ScenarioReport {
            name: scenario.name.clone(),
            verdict,
            trail: execution.trail,
            counters: execution.counters,
        };
        log_verdict(&report);
        report
    }

    /// Run every branch concurrently and aggregate their verdicts.
    pub fn run_parallel(&self, parallel: &ParallelScenario) -> ScenarioReport {
        tracing::debug!(scenario = %parallel.name, branches = parallel.branches.len(), "parallel start");

        let barrier = Barrier::new(parallel.branches.len());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for (index, branch) in parallel.branches.iter().enumerate() {
                let tx = tx.clone();
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let started = Instant::now();
                    let report = self.run(&branch.scenario);
                    // The receiver outlives the scope.
                    let _ = tx.send((index, report, started.elapsed()));
                });
            }
        });
        drop(tx);

        let mut results: Vec<(usize, ScenarioReport, Duration)> = rx.iter().collect();
        results.sort_by_key(|(index, _, _)| *index);

        let verdict = aggregate(results.iter().map(|(index, report, _)| {
            (report.name.as_str(), parallel.branches[*index].mandatory, &report.verdict)
        }));

        let mut counters = Counters::default();
        let mut trail = Vec::with_capacity(results.len());
        for (index, report, elapsed) in &results {
            counters.merge(&report.counters);
            let kind = if parallel.branches[*index].mandatory {
                "mandatory"
            } else {
                "best-effort"
            };
            trail.push(StepRecord {
                index: *index,
                label: format!("{} ({})", report.name, kind),
                outcome: report.verdict.outcome(),
                detail: report.verdict.reason().unwrap_or_default().to_string(),
                elapsed: *elapsed,
            });
        }

        let report = ScenarioReport {
            name: parallel.name.clone(),
            verdict,
            trail,
            counters,
        };
        log_verdict(&report);
        report
    }

    pub fn run_case(&self, case: &Case) -> ScenarioReport {
        match case {
            Case::Single(scenario) => self.run(scenario),
            Case::Parallel(parallel) => self.run_parallel(parallel),
        }
    }

    /// Run cases one after another.
    pub fn run_all(&self, cases: &[Case]) -> Vec<ScenarioReport> {
        cases.iter().map(|case| self.run_case(case)).collect()
    }
}

fn log_verdict(report: &ScenarioReport) {
    match &report.verdict {
        Verdict::Inconclusive(reason) => {
            tracing::warn!(scenario = %report.name, %reason, "INCONCLUSIVE")
        }
        verdict => tracing::info!(scenario = %report.name, verdict = %verdict.outcome(), reason = verdict.reason().unwrap_or(""), "verdict"),
    }
}

/// The scenario could not be set up; its verdict is INCONCLUSIVE.
struct Setup(String);

type StepResult = std::result::Result<Judgement, Setup>;

/// State of one scenario run.
struct Execution<'a> {
    config: &'a HarnessConfig,
    scenario: &'a Scenario,
    conn: Option<Connection>,
    h2: Http2FrameClient,
    events: EventLog,
    /// Bytes received past the end of the previous response.
    leftover: Vec<u8>,
    /// Method of the last request, which decides response framing.
    method: String,
    /// What the preceding expectation saw, kept across reconnects.
    previous: Option<Observation>,
    /// First and last byte of the latest send.
    last_send: Option<Instant>,
    last_byte: Option<Instant>,
    closed_at: Option<Instant>,
    samples: Samples,
    counters: Counters,
    trail: Vec<StepRecord>,
}

impl<'a> Execution<'a> {
    fn new(config: &'a HarnessConfig, scenario: &'a Scenario) -> Self {
        Execution {
            config,
            scenario,
            conn: None,
            h2: Http2FrameClient::new(),
            events: EventLog::new(),
            leftover: Vec::new(),
            method: "GET".to_string(),
            previous: None,
            last_send: None,
            last_byte: None,
            closed_at: None,
            samples: Samples::new(),
            counters: Counters::default(),
            trail: Vec::new(),
        }
    }

    fn run(&mut self) -> Verdict {
        let scenario = self.scenario;
        let mut inconclusive = None;

        for (index, step) in scenario.steps.iter().enumerate() {
            let label = step.label();
            tracing::debug!(scenario = %scenario.name, step = index, %label, "step");
            let started = Instant::now();
            let result = self.execute(step);
            let elapsed = started.elapsed();

            let judgement = match result {
                Ok(judgement) => judgement,
                Err(Setup(reason)) => {
                    let reason = format!("setup: {}", reason);
                    self.record(index, label, Outcome::Inconclusive, reason.clone(), elapsed);
                    return Verdict::Inconclusive(reason);
                }
            };
            tracing::debug!(scenario = %scenario.name, step = index, outcome = %judgement.outcome, reason = %judgement.reason, "step done");
            self.record(index, label.clone(), judgement.outcome, judgement.reason.clone(), elapsed);

            match judgement.outcome {
                Outcome::Pass => {}
                Outcome::Fail => {
                    return Verdict::Fail(format!("step {} ({}): {}", index, label, judgement.reason));
                }
                Outcome::Inconclusive => {
                    if inconclusive.is_none() {
                        inconclusive = Some(format!("step {} ({}): {}", index, label, judgement.reason));
                    }
                }
            }
        }

        match inconclusive {
            Some(reason) => Verdict::Inconclusive(reason),
            None => Verdict::Pass,
        }
    }

    fn record(&mut self, index: usize, label: String, outcome: Outcome, detail: String, elapsed: Duration) {
        self.trail.push(StepRecord {
            index,
            label,
            outcome,
            detail,
            elapsed,
        });
    }

    fn execute(&mut self, step: &Step) -> StepResult {
        match step {
            Step::SendRequest { request, pacing } => self.send_request(request, pacing),
            Step::ExpectResponse { check, read } => self.expect_response(check, *read),
            Step::SendFrame(action) => self.send_frame(action),
            Step::ExpectEvent(check) => self.expect_event(check),
            Step::Wait(duration) => {
                thread::sleep(*duration);
                Ok(Judgement::pass(format!("waited {:?}", duration)))
            }
            Step::Reconnect => {
                self.disconnect();
                self.connect()?;
                Ok(Judgement::pass("reconnected"))
            }
            Step::ExpectClose {
                not_before,
                within,
                from,
            } => Ok(self.expect_close(*not_before, *within, *from)),
            Step::Repeat { times, steps } => self.repeat(*times, steps),
            Step::MeasureLatency {
                label,
                request,
                samples,
            } => self.measure(label, request, *samples),
            Step::ExpectTiming(check) => Ok(check.evaluate(&self.samples)),
        }
    }

    fn target(&self) -> Result<Target, Setup> {
        match self.scenario.transport {
            Transport::Plain => Ok(self.config.plain_target()),
            Transport::Tls => {
                let alpn: &[&str] = match self.scenario.protocol {
                    Protocol::Http1 => &["http/1.1"],
                    Protocol::Http2 => &["h2"],
                };
                self.config
                    .tls_target(alpn)
                    .map_err(|e| Setup(format!("TLS configuration: {}", e)))
            }
        }
    }

    fn connect(&mut self) -> Result<(), Setup> {
        let target = self.target()?;
        let conn = Connection::open(&target, self.config.connect_timeout).map_err(|e| Setup(e.to_string()))?;
        self.conn = Some(conn);
        self.h2 = Http2FrameClient::new();
        self.events = EventLog::new();
        self.leftover.clear();
        self.last_send = None;
        self.last_byte = None;
        self.closed_at = None;
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<(), Setup> {
        if self.conn.is_none() {
            self.connect()?;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::trace!(peer = %conn.peer(), age = ?conn.age(), "closing connection");
            conn.close();
        }
    }

    fn send_request(&mut self, request: &RawRequest, pacing: &PacingPolicy) -> StepResult {
        self.ensure_connected()?;
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(Setup("no connection".to_string())),
        };

        let deadline = pacing.minimum_duration(request.len()) + self.config.response_timeout;
        self.method = request.method.clone();
        self.counters.requests_sent += 1;
        tracing::debug!(probe = %request.probe, len = request.len(), ?pacing, "sending request");

        let started = Instant::now();
        let judgement = match conn.send(&request.bytes, pacing, deadline) {
            Ok(report) => {
                self.counters.bytes_sent += report.bytes_sent as u64;
                self.last_send = Some(report.started_at);
                self.last_byte = Some(report.started_at + report.elapsed);
                Judgement::pass(format!("{} bytes in {:.0?}", report.bytes_sent, report.elapsed))
            }
            Err(net::Error::PeerClosed { bytes_sent }) => {
                self.counters.bytes_sent += bytes_sent as u64;
                self.last_send = Some(started);
                self.last_byte = Some(Instant::now());
                self.closed_at = self.last_byte;
                Judgement::pass(format!("peer closed after {} of {} bytes", bytes_sent, request.len()))
            }
            Err(net::Error::PeerReset) => {
                self.last_send = Some(started);
                self.last_byte = Some(Instant::now());
                self.closed_at = self.last_byte;
                Judgement::pass("peer reset the connection during the send")
            }
            Err(net::Error::Timeout) => {
                self.last_send = Some(started);
                self.last_byte = Some(Instant::now());
                Judgement::pass(format!("send still blocked after {:.0?}", deadline))
            }
            Err(e) => Judgement::inconclusive(format!("transport: {}", e)),
        };
        Ok(judgement)
    }

    fn expect_response(&mut self, check: &Check, read: ReadPolicy) -> StepResult {
        let observation = self.read_response(read)?;
        if observation.response().is_some() {
            self.counters.responses_read += 1;
        }
        tracing::debug!(%observation, "response observed");
        let judgement = check.evaluate_after(&observation, self.previous.as_ref());
        self.previous = Some(observation);
        Ok(judgement)
    }

    fn read_response(&mut self, read: ReadPolicy) -> Result<Observation, Setup> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(Setup("no request was sent".to_string())),
        };
        let timeout = self.config.response_timeout;
        let overall = Instant::now() + timeout;

        let mut reader = Http1ResponseReader::for_method(&self.method);
        let mut received = self.leftover.len();
        let mut state = if self.leftover.is_empty() {
            ReaderState::NeedMoreHeaderBytes
        } else {
            reader.feed(&std::mem::take(&mut self.leftover))
        };

        loop {
            if let ReaderState::Complete(response) = &state {
                if response.is_interim() {
                    tracing::debug!(status = response.status(), "skipping interim response");
                    let leftover = reader.take_leftover();
                    reader = Http1ResponseReader::for_method(&self.method);
                    state = if leftover.is_empty() {
                        ReaderState::NeedMoreHeaderBytes
                    } else {
                        reader.feed(&leftover)
                    };
                    continue;
                }
            }
            if let Some(observation) = Observation::from_reader(state) {
                self.leftover = reader.take_leftover();
                return Ok(observation);
            }

            let (max_bytes, wait, delay) = match read {
                ReadPolicy::Eager => (READ_CHUNK, overall.saturating_duration_since(Instant::now()), Duration::ZERO),
                ReadPolicy::Paced { bytes, delay } => (bytes.max(1), timeout, delay),
            };
            if wait.is_zero() {
                return Ok(Observation::TimedOut {
                    bytes_received: received,
                });
            }

            match conn.recv(max_bytes, wait) {
                Ok(bytes) if bytes.is_empty() => {
                    self.closed_at.get_or_insert_with(Instant::now);
                    if received == 0 {
                        return Ok(Observation::Closed { bytes_received: 0 });
                    }
                    return Ok(Observation::from_reader(reader.finish()).unwrap_or(Observation::Closed {
                        bytes_received: received,
                    }));
                }
                Ok(bytes) => {
                    received += bytes.len();
                    tracing::trace!(len = bytes.len(), received, "response bytes");
                    state = reader.feed(&bytes);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(net::Error::Timeout) => {
                    return Ok(Observation::TimedOut {
                        bytes_received: received,
                    })
                }
                Err(e) => {
                    tracing::debug!(error = %e, "connection ended while reading");
                    self.closed_at.get_or_insert_with(Instant::now);
                    return Ok(Observation::Reset);
                }
            }
        }
    }

    fn expect_close(&mut self, not_before: Duration, within: Duration, from: CloseAnchor) -> Judgement {
        let anchor = match from {
            CloseAnchor::FirstByte => self.last_send,
            CloseAnchor::LastByte => self.last_byte,
        };
        let anchor = match anchor {
            Some(anchor) => anchor,
            None => return Judgement::inconclusive("nothing was sent on this connection"),
        };
        if self.closed_at.is_none() {
            self.closed_at = self.wait_for_close(anchor + within);
        }

        match self.closed_at {
            Some(at) => {
                let after = at.saturating_duration_since(anchor);
                if after < not_before {
                    Judgement::inconclusive(format!(
                        "closed after {:.1?}, earlier than the expected {:.1?}",
                        after, not_before
                    ))
                } else if after <= within {
                    Judgement::pass(format!("closed after {:.1?}", after))
                } else {
                    Judgement::fail(format!("closed only after {:.1?} (limit {:.1?})", after, within))
                }
            }
            None => Judgement::fail(format!(
                "connection still open {:.1?} after the {} (limit {:.1?})",
                anchor.elapsed(),
                from,
                within
            )),
        }
    }

    /// Read and discard until the peer closes or `limit` passes.
    fn wait_for_close(&mut self, limit: Instant) -> Option<Instant> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Some(Instant::now()),
        };
        loop {
            let remaining = limit.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return match conn.try_recv(READ_CHUNK) {
                    Ok(Some(bytes)) if bytes.is_empty() => Some(Instant::now()),
                    Ok(_) => None,
                    Err(_) => Some(Instant::now()),
                };
            }
            match conn.recv(READ_CHUNK, remaining) {
                Ok(bytes) if bytes.is_empty() => return Some(Instant::now()),
                Ok(bytes) => tracing::trace!(len = bytes.len(), "discarding bytes while waiting for close"),
                Err(net::Error::Timeout) => {}
                Err(_) => return Some(Instant::now()),
            }
        }
    }

    fn repeat(&mut self, times: usize, steps: &[Step]) -> StepResult {
        let mut completed = 0;
        let mut inconclusive = None;

        for _ in 0..times {
            if self.h2_finished() {
                break;
            }
            for step in steps {
                let judgement = self.execute(step)?;
                match judgement.outcome {
                    Outcome::Pass => {}
                    Outcome::Fail => {
                        return Ok(Judgement::fail(format!(
                            "iteration {}, {}: {}",
                            completed + 1,
                            step.label(),
                            judgement.reason
                        )));
                    }
                    Outcome::Inconclusive => {
                        if inconclusive.is_none() {
                            inconclusive = Some(judgement);
                        }
                    }
                }
            }
            completed += 1;
        }

        if let Some(judgement) = inconclusive {
            return Ok(judgement);
        }
        let mut reason = format!("{} of {} iterations", completed, times);
        if completed < times {
            reason.push_str(", stopped by connection termination");
        }
        Ok(Judgement::pass(reason))
    }

    fn h2_finished(&self) -> bool {
        self.scenario.protocol == Protocol::Http2
            && (self.h2.state() == ClientState::Terminated || self.events.is_closed())
    }

    fn send_frame(&mut self, action: &FrameAction) -> StepResult {
        if let FrameAction::Initiate = action {
            return self.initiate();
        }
        if self.conn.is_none() {
            return Err(Setup("HTTP/2 connection not initiated".to_string()));
        }
        if self.h2_finished() {
            return Ok(Judgement::pass("skipped, connection already terminated"));
        }

        let last = self.h2.last_stream_id();
        let result: h2::Result<String> = match action {
            FrameAction::Initiate => Ok(String::new()),
            FrameAction::OpenStream { headers, end_stream } => self
                .h2
                .open_stream(headers.as_slice(), *end_stream)
                .map(|id| format!("opened stream {}", id)),
            FrameAction::OpenStreamRaw { block, end_stream } => self
                .h2
                .open_stream_with_block(block, *end_stream)
                .map(|id| format!("opened stream {} with a {} byte block", id, block.len())),
            FrameAction::Data {
                stream,
                payload,
                end_stream,
            } => {
                let id = stream.resolve(last);
                self.h2
                    .send_data(id, payload, *end_stream)
                    .map(|()| format!("{} bytes on stream {}", payload.len(), id))
            }
            FrameAction::Reset { stream, code } => {
                let id = stream.resolve(last);
                self.h2
                    .reset_stream(id, *code)
                    .map(|()| format!("reset stream {} with {}", id, code))
            }
            FrameAction::Goaway(code) => self.h2.goaway(*code).map(|()| format!("sent GOAWAY {}", code)),
        };

        let detail = match result {
            Ok(detail) => detail,
            Err(h2::Error::Terminated) => return Ok(Judgement::pass("skipped, connection already terminated")),
            Err(e) => return Ok(Judgement::fail(format!("client: {}", e))),
        };

        self.counters.frames_sent += 1;
        match action {
            FrameAction::OpenStream { .. } | FrameAction::OpenStreamRaw { .. } => self.counters.streams_opened += 1,
            FrameAction::Reset { .. } => self.counters.resets_sent += 1,
            _ => {}
        }

        self.flush_h2()?;
        self.poll_h2();
        Ok(Judgement::pass(detail))
    }

    fn initiate(&mut self) -> StepResult {
        self.ensure_connected()?;

        if self.scenario.transport == Transport::Tls {
            let alpn = self.conn.as_ref().and_then(|conn| conn.alpn());
            if alpn != Some(ALPN_H2) {
                let negotiated = alpn
                    .map(|a| String::from_utf8_lossy(a).into_owned())
                    .unwrap_or_else(|| "nothing".to_string());
                return Ok(Judgement::fail(format!("ALPN negotiated {}, expected h2", negotiated)));
            }
        }

        if let Err(e) = self.h2.initiate() {
            return Ok(Judgement::fail(format!("client: {}", e)));
        }
        self.counters.frames_sent += 1;
        self.flush_h2()?;

        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            if self
                .events
                .events()
                .any(|e| matches!(e, Http2Event::SettingsReceived(_)))
            {
                return Ok(Judgement::pass(format!(
                    "server SETTINGS {}",
                    self.h2.remote_settings()
                )));
            }
            if self.events.is_closed() {
                return Err(Setup("connection closed before the server sent SETTINGS".to_string()));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Setup("no SETTINGS from the server".to_string()));
            }
            self.recv_h2(remaining)?;
        }
    }

    fn expect_event(&mut self, check: &EventCheck) -> StepResult {
        if self.conn.is_none() {
            return Err(Setup("HTTP/2 connection not initiated".to_string()));
        }
        self.poll_h2();

        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let ctx = EventContext {
                last_stream_id: self.h2.last_stream_id(),
                resets_sent: self.counters.resets_sent,
            };
            let now = Instant::now();
            let last_call = self.events.is_closed() || now >= deadline;
            if let Some(judgement) = check.evaluate(&self.events, &ctx, last_call) {
                return Ok(judgement);
            }
            if last_call {
                return Ok(Judgement::inconclusive("event check undecided"));
            }
            self.recv_h2(deadline - now)?;
        }
    }

    /// Write queued frames.
    fn flush_h2(&mut self) -> Result<(), Setup> {
        if !self.h2.has_outbound() {
            return Ok(());
        }
        let bytes = self.h2.take_outbound();
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(Setup("no connection".to_string())),
        };
        match conn.send(&bytes, &PacingPolicy::Immediate, self.config.response_timeout) {
            Ok(report) => self.counters.bytes_sent += report.bytes_sent as u64,
            Err(net::Error::Timeout) => tracing::warn!(len = bytes.len(), "HTTP/2 write stalled"),
            Err(e) => {
                tracing::debug!(error = %e, "HTTP/2 connection lost while writing");
                self.h2.connection_lost();
                self.events.mark_closed(self.counters.resets_sent);
            }
        }
        Ok(())
    }

    /// Feed whatever has already arrived to the client without blocking.
    fn poll_h2(&mut self) {
        while let Some(conn) = self.conn.as_mut() {
            match conn.try_recv(READ_CHUNK) {
                Ok(None) => break,
                Ok(Some(bytes)) if bytes.is_empty() => {
                    self.lost_h2();
                    break;
                }
                Ok(Some(bytes)) => self.feed_h2(&bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "HTTP/2 connection lost");
                    self.lost_h2();
                    break;
                }
            }
        }
        // Automatic replies (SETTINGS ACK, PING ACK) go out right away.
        if !self.events.is_closed() {
            let _ = self.flush_h2();
        }
    }

    /// Block up to `wait` for one batch of bytes.
    fn recv_h2(&mut self, wait: Duration) -> Result<(), Setup> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(Setup("no connection".to_string())),
        };
        match conn.recv(READ_CHUNK, wait) {
            Ok(bytes) if bytes.is_empty() => self.lost_h2(),
            Ok(bytes) => self.feed_h2(&bytes),
            Err(net::Error::Timeout) => {}
            Err(e) => {
                tracing::debug!(error = %e, "HTTP/2 connection lost");
                self.lost_h2();
            }
        }
        if !self.events.is_closed() {
            self.flush_h2()?;
        }
        Ok(())
    }

    fn feed_h2(&mut self, bytes: &[u8]) {
        for event in self.h2.on_bytes(bytes) {
            tracing::trace!(%event, resets = self.counters.resets_sent, "HTTP/2 event");
            self.events.push(event, self.counters.resets_sent);
        }
    }

    fn lost_h2(&mut self) {
        self.closed_at.get_or_insert_with(Instant::now);
        self.h2.connection_lost();
        self.events.mark_closed(self.counters.resets_sent);
    }

    /// Time `samples` round trips, one fresh connection each.
    fn measure(&mut self, label: &str, request: &RawRequest, samples: usize) -> StepResult {
        let target = self.target()?;
        let timeout = self.config.response_timeout;
        let mut taken = Vec::with_capacity(samples);

        for sample in 0..samples {
            let mut conn =
                Connection::open(&target, self.config.connect_timeout).map_err(|e| Setup(e.to_string()))?;
            let started = Instant::now();
            self.counters.requests_sent += 1;
            match conn.send(&request.bytes, &PacingPolicy::Immediate, timeout) {
                Ok(report) => self.counters.bytes_sent += report.bytes_sent as u64,
                Err(e) => {
                    return Ok(Judgement::inconclusive(format!(
                        "{} sample {}: {}",
                        label, sample, e
                    )))
                }
            }
            if read_complete(&mut conn, &request.method, timeout).is_none() {
                return Ok(Judgement::inconclusive(format!(
                    "{} sample {}: no complete response",
                    label, sample
                )));
            }
            taken.push(started.elapsed());
            self.counters.responses_read += 1;
            conn.close();
        }

        let mean = timing::mean(&taken).unwrap_or_default();
        self.samples.insert(label.to_string(), taken);
        Ok(Judgement::pass(format!("{} samples, mean {:.2?}", samples, mean)))
    }
}

/// Read one response off a fresh connection.
fn read_complete(conn: &mut Connection, method: &str, timeout: Duration) -> Option<HttpResponse> {
    let deadline = Instant::now() + timeout;
    let mut reader = Http1ResponseReader::for_method(method);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let state = match conn.recv(READ_CHUNK, remaining) {
            Ok(bytes) if bytes.is_empty() => reader.finish(),
            Ok(bytes) => reader.feed(&bytes),
            Err(_) => return None,
        };
        match state {
            ReaderState::Complete(response) if response.is_interim() => {
                let leftover = reader.take_leftover();
                reader = Http1ResponseReader::for_method(method);
                if !leftover.is_empty() {
                    if let ReaderState::Complete(response) = reader.feed(&leftover) {
                        if !response.is_interim() {
                            return Some(response);
                        }
                    }
                }
            }
            ReaderState::Complete(response) => return Some(response),
            ReaderState::NeedMoreHeaderBytes | ReaderState::NeedMoreBodyBytes(_) => {}
            _ => return None,
        }
    }
}
