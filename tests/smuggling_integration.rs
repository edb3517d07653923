//! Smuggling suite against strict and lenient mock servers

mod common;

use common::{http1_server, response, MockRequest};
use vharness::scenario::{Outcome, ScenarioRunner};
use vharness::suites;

/// Rejects ambiguous framing the way a hardened server does.
fn strict(request: &MockRequest) -> Vec<u8> {
    let lengths = request.headers("Content-Length");
    let encodings = request.headers("Transfer-Encoding");
    let reject = |body: &str| response(400, "Bad Request", &[("Connection", "close")], body);

    if lengths.len() > 1 {
        return reject("Duplicate Content-Length");
    }
    if encodings.len() > 1 {
        return reject("Duplicate Transfer-Encoding");
    }
    if !lengths.is_empty() && !encodings.is_empty() {
        return reject("Content-Length and Transfer-Encoding are mutually exclusive");
    }
    if let Some(encoding) = encodings.first() {
        if encoding.contains(',') {
            return reject("Only chunked is supported");
        }
        if !encoding.eq_ignore_ascii_case("chunked") {
            return reject("Invalid Transfer-Encoding");
        }
    }
    response(200, "OK", &[], "hello")
}

#[test]
fn test_strict_server_passes_smuggling_suite() {
    let addr = http1_server(strict);
    let config = common::config(addr);
    let runner = ScenarioRunner::new(config.clone());

    for case in suites::smuggling::cases(&config) {
        let report = runner.run_case(&case);
        assert_eq!(report.verdict.outcome(), Outcome::Pass, "{}", report);
        assert!(report.counters.requests_sent >= 1);
        assert!(report.counters.responses_read >= 1);
    }
}

#[test]
fn test_lenient_server_fails_duplicate_framing() {
    let addr = http1_server(|_| response(200, "OK", &[], "ok"));
    let config = common::config(addr);
    let runner = ScenarioRunner::new(config.clone());

    let reports = runner.run_all(&suites::smuggling::cases(&config));
    let outcome = |name: &str| {
        reports
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.verdict.outcome())
            .unwrap()
    };

    assert_eq!(outcome("smuggling: duplicate Content-Length"), Outcome::Fail);
    assert_eq!(outcome("smuggling: duplicate Transfer-Encoding"), Outcome::Fail);
    assert_eq!(outcome("smuggling: CL.TE"), Outcome::Fail);
    assert_eq!(outcome("smuggling: TE.CL"), Outcome::Fail);
    assert_eq!(outcome("smuggling: valid Content-Length control"), Outcome::Pass);

    let failed = reports.iter().find(|r| r.name == "smuggling: CL.TE").unwrap();
    assert!(failed.verdict.reason().unwrap().contains("status"));
}

#[test]
fn test_unreachable_target_is_inconclusive() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = common::config(addr);
    let runner = ScenarioRunner::new(config.clone());
    let report = runner.run_case(&suites::smuggling::cases(&config)[0]);
    assert_eq!(report.verdict.outcome(), Outcome::Inconclusive);
    assert!(report.verdict.reason().unwrap().contains("setup:"));
}
