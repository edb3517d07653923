//! Basic authentication and password comparison timing

use crate::config::HarnessConfig;
use crate::http::{request, RequestBuilder};
use crate::scenario::{Case, Check, Scenario, Step, TimingCheck};

const PROTECTED_PATH: &str = "/protected/test.html";
const USER: &str = "testuser";
const PASSWORD: &str = "testpass";

/// Wrong in every position.
const WRONG_PASSWORD: &str = "xxxxxxxxxx";
/// Shares a long prefix with the real password.
const PARTIAL_PASSWORD: &str = "testpasxxx";

fn challenged() -> Check {
    Check::status(401).and(Check::header_present("WWW-Authenticate").soft())
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let t = &config.thresholds;

    let timing = Scenario::http1("auth: password comparison timing")
        .step(Step::MeasureLatency {
            label: "wrong password".to_string(),
            request: request::basic_auth(PROTECTED_PATH, USER, WRONG_PASSWORD),
            samples: t.timing_samples,
        })
        .step(Step::MeasureLatency {
            label: "partial password".to_string(),
            request: request::basic_auth(PROTECTED_PATH, USER, PARTIAL_PASSWORD),
            samples: t.timing_samples,
        })
        .step(Step::ExpectTiming(TimingCheck::new(
            "wrong password",
            "partial password",
            t.timing_variance_pct,
        )));

    vec![
        Scenario::http1("auth: correct credentials")
            .request(request::basic_auth(PROTECTED_PATH, USER, PASSWORD), Check::status(200))
            .into(),
        Scenario::http1("auth: wrong password")
            .request(request::basic_auth(PROTECTED_PATH, USER, "wrongpass"), challenged())
            .into(),
        Scenario::http1("auth: no credentials")
            .request(RequestBuilder::get(PROTECTED_PATH).build(), challenged())
            .into(),
        timing.into(),
    ]
}
