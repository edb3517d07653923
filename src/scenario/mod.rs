//! Declarative scenarios and their execution
//!
//! A [`Scenario`] is data: an ordered list of [`Step`]s sending raw
//! requests or HTTP/2 frames and checking what comes back. The
//! [`ScenarioRunner`] executes it and produces a [`ScenarioReport`] with
//! exactly one [`Verdict`].
//!
//! # Examples
//!
//! ```no_run
//! use vharness::config::HarnessConfig;
//! use vharness::http::request;
//! use vharness::scenario::{Check, Scenario, ScenarioRunner};
//!
//! let scenario = Scenario::http1("duplicate Transfer-Encoding").request(
//!     request::duplicate_transfer_encoding("/x"),
//!     Check::status(400).and(Check::mentions("duplicate")),
//! );
//!
//! let runner = ScenarioRunner::new(HarnessConfig::new("127.0.0.1", 8080));
//! let report = runner.run(&scenario);
//! println!("{}", report);
//! ```

pub mod check;
pub mod runner;
pub mod step;
pub mod timing;
pub mod verdict;

pub use check::{Check, Condition, EventCheck, EventContext, EventLog, Observation};
pub use runner::ScenarioRunner;
pub use step::{
    Branch, Case, CloseAnchor, FrameAction, ParallelScenario, Protocol, ReadPolicy, Scenario, Step, StreamRef, Transport,
};
pub use timing::TimingCheck;
pub use verdict::{Counters, Judgement, Outcome, ScenarioReport, StepRecord, Verdict};
