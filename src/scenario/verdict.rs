//! Verdicts, per-step judgements and run reports

use std::fmt;
use std::time::Duration;

/// Outcome of one predicate or one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pass,
    Fail,
    Inconclusive,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Inconclusive => "INCONCLUSIVE",
        })
    }
}

/// A predicate result with its explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgement {
    pub outcome: Outcome,
    pub reason: String,
}

impl Judgement {
    pub fn pass(reason: impl Into<String>) -> Self {
        Judgement {
            outcome: Outcome::Pass,
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Judgement {
            outcome: Outcome::Fail,
            reason: reason.into(),
        }
    }

    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Judgement {
            outcome: Outcome::Inconclusive,
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.outcome == Outcome::Fail
    }

    /// FAIL becomes INCONCLUSIVE; other outcomes are kept.
    pub fn soften(self) -> Self {
        match self.outcome {
            Outcome::Fail => Judgement::inconclusive(format!("tolerated: {}", self.reason)),
            _ => self,
        }
    }

    pub fn into_verdict(self) -> Verdict {
        match self.outcome {
            Outcome::Pass => Verdict::Pass,
            Outcome::Fail => Verdict::Fail(self.reason),
            Outcome::Inconclusive => Verdict::Inconclusive(self.reason),
        }
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome, self.reason)
    }
}

/// Final result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    Inconclusive(String),
}

impl Verdict {
    pub fn outcome(&self) -> Outcome {
        match self {
            Verdict::Pass => Outcome::Pass,
            Verdict::Fail(_) => Outcome::Fail,
            Verdict::Inconclusive(_) => Outcome::Inconclusive,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(reason) | Verdict::Inconclusive(reason) => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.outcome(), reason),
            None => write!(f, "{}", self.outcome()),
        }
    }
}

/// Combine branch verdicts of a parallel scenario.
///
/// A failing mandatory branch fails the whole; an inconclusive mandatory
/// branch or any non-passing best-effort branch makes it INCONCLUSIVE.
pub fn aggregate<'a, I>(branches: I) -> Verdict
where
    I: IntoIterator<Item = (&'a str, bool, &'a Verdict)>,
{
    let mut inconclusive = None;
    for (name, mandatory, verdict) in branches {
        match (verdict, mandatory) {
            (Verdict::Pass, _) => {}
            (Verdict::Fail(reason), true) => {
                return Verdict::Fail(format!("{}: {}", name, reason));
            }
            (other, _) => {
                if inconclusive.is_none() {
                    let reason = other.reason().unwrap_or_default();
                    inconclusive = Some(format!("{}: {}", name, reason));
                }
            }
        }
    }
    match inconclusive {
        Some(reason) => Verdict::Inconclusive(reason),
        None => Verdict::Pass,
    }
}

/// One executed step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub outcome: Outcome,
    pub detail: String,
    pub elapsed: Duration,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] {} ({:.0?})",
            self.index, self.label, self.outcome, self.detail, self.elapsed
        )
    }
}

/// Per-run traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub requests_sent: u64,
    pub bytes_sent: u64,
    pub frames_sent: u64,
    pub streams_opened: u64,
    pub resets_sent: u64,
    pub responses_read: u64,
}

impl Counters {
    pub fn merge(&mut self, other: &Counters) {
        self.requests_sent += other.requests_sent;
        self.bytes_sent += other.bytes_sent;
        self.frames_sent += other.frames_sent;
        self.streams_opened += other.streams_opened;
        self.resets_sent += other.resets_sent;
        self.responses_read += other.responses_read;
    }
}

/// Verdict plus the trail that led to it.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub verdict: Verdict,
    pub trail: Vec<StepRecord>,
    pub counters: Counters,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verdict.reason() {
            Some(reason) => write!(f, "{:<12} {} ({})", self.verdict.outcome(), self.name, reason),
            None => write!(f, "{:<12} {}", self.verdict.outcome(), self.name),
        }
    }
}
