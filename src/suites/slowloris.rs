//! Slow-client resource exhaustion
//!
//! A server must drop clients that trickle their headers, and must keep
//! serving ordinary clients while slow ones hold connections open.

use crate::config::HarnessConfig;
use crate::http::{request, Probe, RawRequest, RequestBuilder};
use crate::net::PacingPolicy;
use crate::scenario::{Case, Check, CloseAnchor, ParallelScenario, ReadPolicy, Scenario, Step};
use std::time::Duration;

const SLOW_CONNECTIONS: usize = 5;
/// Head start the slow branches get before the legitimate request.
const HOLD_OPEN: Duration = Duration::from_secs(1);

fn legitimate_request(config: &HarnessConfig) -> RawRequest {
    RequestBuilder::get(config.resource.as_str())
        .header("Connection", "close")
        .build()
}

/// A request line that never finishes.
fn partial_request_line() -> RawRequest {
    RawRequest {
        bytes: b"GET /".to_vec(),
        method: "GET".to_string(),
        probe: Probe::new("RFC 7230 §6.5", "partial request line"),
    }
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let t = &config.thresholds;
    let (not_before, within) = t.slowloris_window();

    let slowloris = Scenario::http1("slowloris: trickled headers")
        .step(Step::send_paced(
            request::slow_headers("/"),
            PacingPolicy::PerByte(t.slowloris_delay),
        ))
        .step(Step::ExpectClose {
            not_before,
            within,
            from: CloseAnchor::FirstByte,
        });

    let slow_read = Scenario::http1("slowloris: slow read").step(Step::send(legitimate_request(config))).step(
        Step::ExpectResponse {
            check: Check::status(200).or(Check::ConnectionClosed),
            read: ReadPolicy::Paced {
                bytes: 1,
                delay: Duration::from_millis(20),
            },
        },
    );

    let legitimate = Scenario::http1("slowloris: legitimate client")
        .request(legitimate_request(config), Check::status(200));

    let mut flood = ParallelScenario::new("slowloris: legitimate client among slow connections");
    for i in 0..SLOW_CONNECTIONS {
        flood = flood.best_effort(
            Scenario::http1(format!("slow connection {}", i + 1))
                .step(Step::send(partial_request_line()))
                .step(Step::Wait(HOLD_OPEN + config.response_timeout)),
        );
    }
    flood = flood.mandatory(
        Scenario::http1("legitimate client")
            .step(Step::Wait(HOLD_OPEN))
            .request(legitimate_request(config), Check::status(200)),
    );

    vec![slowloris.into(), slow_read.into(), legitimate.into(), flood.into()]
}
