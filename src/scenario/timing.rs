//! Coarse latency comparison
//!
//! Compares the mean round-trip time of two labelled sample sets. The
//! comparison can only PASS or come out INCONCLUSIVE: latency differences
//! on a shared network are evidence, not proof.

use super::verdict::Judgement;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Latency samples per `MeasureLatency` label.
pub type Samples = HashMap<String, Vec<Duration>>;

#[derive(Debug, Clone, PartialEq)]
pub struct TimingCheck {
    pub baseline: String,
    pub candidate: String,
    /// Largest accepted `|candidate - baseline| / baseline`, in percent.
    pub max_variance_pct: f64,
}

impl TimingCheck {
    pub fn new(baseline: impl Into<String>, candidate: impl Into<String>, max_variance_pct: f64) -> Self {
        TimingCheck {
            baseline: baseline.into(),
            candidate: candidate.into(),
            max_variance_pct,
        }
    }

    pub fn evaluate(&self, samples: &Samples) -> Judgement {
        let baseline = match samples.get(&self.baseline).and_then(|s| mean(s)) {
            Some(mean) => mean,
            None => return Judgement::inconclusive(format!("no samples for {}", self.baseline)),
        };
        let candidate = match samples.get(&self.candidate).and_then(|s| mean(s)) {
            Some(mean) => mean,
            None => return Judgement::inconclusive(format!("no samples for {}", self.candidate)),
        };

        let variance = variance_pct(baseline, candidate);
        let summary = format!(
            "{} {:.2?} vs {} {:.2?}: {:.1}% variance",
            self.baseline, baseline, self.candidate, candidate, variance
        );
        if variance < self.max_variance_pct {
            Judgement::pass(summary)
        } else {
            tracing::warn!(%summary, limit = self.max_variance_pct, "timing variance above limit");
            Judgement::inconclusive(format!("{} (limit {}%)", summary, self.max_variance_pct))
        }
    }
}

impl fmt::Display for TimingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} within {}% of {}",
            self.candidate, self.max_variance_pct, self.baseline
        )
    }
}

pub fn mean(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: Duration = samples.iter().sum();
    Some(total / samples.len() as u32)
}

/// Relative difference of `candidate` to `baseline`, in percent.
pub fn variance_pct(baseline: Duration, candidate: Duration) -> f64 {
    let b = baseline.as_secs_f64();
    let c = candidate.as_secs_f64();
    if b == 0.0 {
        return if c == 0.0 { 0.0 } else { f64::INFINITY };
    }
    (b - c).abs() / b * 100.0
}
