//! Slow-client scenarios with shortened timeouts

mod common;

use common::spawn;
use std::io::Read;
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};
use vharness::config::{HarnessConfig, Thresholds};
use vharness::http::request;
use vharness::net::PacingPolicy;
use vharness::scenario::{Case, CloseAnchor, Outcome, Scenario, ScenarioRunner, Step};
use vharness::suites;

/// Drops the client once `limit` has passed since its first byte.
fn header_timeout_server(limit: Duration) -> std::net::SocketAddr {
    spawn(move |mut stream: TcpStream| {
        let mut first: Option<Instant> = None;
        let mut buf = [0u8; 1024];
        loop {
            let remaining = match first {
                Some(at) => limit.saturating_sub(at.elapsed()),
                None => Duration::from_secs(30),
            };
            if remaining.is_zero() {
                break;
            }
            stream.set_read_timeout(Some(remaining)).unwrap();
            match stream.read(&mut buf) {
                Ok(0) => return,
                Ok(_) => {
                    first.get_or_insert_with(Instant::now);
                }
                Err(_) => break,
            }
        }
        let _ = stream.shutdown(Shutdown::Both);
    })
}

/// Never closes on its own.
fn patient_server() -> std::net::SocketAddr {
    spawn(|mut stream: TcpStream| {
        let mut buf = [0u8; 1024];
        while let Ok(n) = stream.read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    })
}

fn short_config(addr: std::net::SocketAddr) -> HarnessConfig {
    let thresholds = Thresholds {
        header_timeout: Duration::from_secs(1),
        slowloris_grace: Duration::from_millis(500),
        slowloris_delay: Duration::from_millis(25),
        ..Default::default()
    };
    common::config(addr).thresholds(thresholds)
}

fn slowloris_case(config: &HarnessConfig) -> Case {
    suites::slowloris::cases(config)
        .into_iter()
        .find(|c| c.name() == "slowloris: trickled headers")
        .unwrap()
}

#[test]
fn test_timely_close_passes() {
    let config = short_config(header_timeout_server(Duration::from_secs(1)));
    let report = ScenarioRunner::new(config.clone()).run_case(&slowloris_case(&config));
    assert_eq!(report.verdict.outcome(), Outcome::Pass, "{}", report);
    // The whole request line went out before the server gave up.
    assert_eq!(report.counters.bytes_sent, b"GET / HTTP/1.1\r\n".len() as u64);
}

#[test]
fn test_connection_left_open_fails() {
    let config = short_config(patient_server());
    let started = Instant::now();
    let report = ScenarioRunner::new(config.clone()).run_case(&slowloris_case(&config));
    assert_eq!(report.verdict.outcome(), Outcome::Fail, "{}", report);
    assert!(report.verdict.reason().unwrap().contains("still open"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_premature_close_is_inconclusive() {
    let config = short_config(header_timeout_server(Duration::from_millis(100)));
    let report = ScenarioRunner::new(config.clone()).run_case(&slowloris_case(&config));
    assert_eq!(report.verdict.outcome(), Outcome::Inconclusive, "{}", report);
}

#[test]
fn test_flood_keeps_legitimate_client_served() {
    let addr = common::http1_server(|_| common::response(200, "OK", &[("Connection", "close")], "ok"));
    let config = common::config(addr).response_timeout(Duration::from_millis(500));
    let flood = suites::slowloris::cases(&config).pop().unwrap();
    assert!(matches!(flood, Case::Parallel(_)));

    let started = Instant::now();
    let report = ScenarioRunner::new(config).run_case(&flood);
    assert!(report.verdict.is_pass(), "{}", report);
    assert_eq!(report.trail.len(), 6);
    // Branches run side by side, not one after another.
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Closes `after` the client finished its request line.
fn line_then_close_server(after: Duration) -> std::net::SocketAddr {
    spawn(move |mut stream: TcpStream| {
        let mut line = Vec::new();
        let mut buf = [0u8; 64];
        while !line.ends_with(b"\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => line.extend_from_slice(&buf[..n]),
            }
        }
        std::thread::sleep(after);
        let _ = stream.shutdown(Shutdown::Both);
    })
}

#[test]
fn test_close_window_anchors() {
    let addr = line_then_close_server(Duration::from_millis(300));
    let runner = ScenarioRunner::new(common::config(addr));
    let trickle = |from: CloseAnchor| {
        Scenario::http1("trickled line")
            .step(Step::send_paced(
                request::slow_headers("/"),
                PacingPolicy::PerByte(Duration::from_millis(50)),
            ))
            .step(Step::ExpectClose {
                not_before: Duration::from_millis(100),
                within: Duration::from_millis(800),
                from,
            })
    };

    // About 300 ms after the last byte, but well over 800 ms after the first.
    let report = runner.run(&trickle(CloseAnchor::LastByte));
    assert_eq!(report.verdict.outcome(), Outcome::Pass, "{}", report);

    let report = runner.run(&trickle(CloseAnchor::FirstByte));
    assert_eq!(report.verdict.outcome(), Outcome::Fail, "{}", report);
    assert!(report.verdict.reason().unwrap().contains("first byte"), "{}", report);
}
