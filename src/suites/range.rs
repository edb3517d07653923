//! Byte range requests against the configured resource

use crate::config::HarnessConfig;
use crate::http::{request, Method, RequestBuilder};
use crate::scenario::{Case, Check, Judgement, Scenario};

const PAST: &str = "Mon, 01 Jan 2020 00:00:00 GMT";
const FUTURE: &str = "Mon, 01 Jan 2030 00:00:00 GMT";

/// `206` with a body of at most `max` bytes.
fn partial_at_most(max: usize) -> Check {
    Check::status(206).and(Check::custom(
        format!("body of at most {} bytes", max),
        move |obs| match obs.response() {
            Some(resp) if resp.body().len() <= max => Judgement::pass(format!("{} byte body", resp.body().len())),
            Some(resp) => Judgement::fail(format!("{} byte body", resp.body().len())),
            None => Judgement::fail(format!("no response ({})", obs)),
        },
    ))
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let path = config.resource.as_str();
    let get = |ranges: &str| request::range_request(Method::Get, path, ranges);

    vec![
        Scenario::http1("range: Accept-Ranges advertised")
            .request(
                RequestBuilder::get(path).build(),
                Check::status(200).and(Check::header_equals("Accept-Ranges", "bytes")),
            )
            .into(),
        Scenario::http1("range: first 100 bytes")
            .request(get("bytes=0-99"), Check::partial_content(100))
            .into(),
        Scenario::http1("range: middle 100 bytes")
            .request(
                get("bytes=50-149"),
                Check::status(206).and(Check::header_equals("Content-Length", "100")),
            )
            .into(),
        Scenario::http1("range: open-ended")
            .request(get("bytes=100-"), Check::status(206))
            .into(),
        Scenario::http1("range: suffix")
            .request(get("bytes=-100"), partial_at_most(100))
            .into(),
        Scenario::http1("range: unsatisfiable")
            .request(get("bytes=999999-9999999"), Check::range_not_satisfiable())
            .into(),
        // Servers may coalesce ranges or ignore them entirely.
        Scenario::http1("range: multiple ranges")
            .request(
                get("bytes=0-49, 100-149"),
                Check::any_of([
                    Check::status(206).and(Check::header_contains("Content-Type", "multipart/byteranges")),
                    Check::status(200),
                    Check::status(206).soft(),
                ]),
            )
            .into(),
        Scenario::http1("range: HEAD with Range")
            .request(
                request::range_request(Method::Head, path, "bytes=0-99"),
                Check::all_of([
                    Check::status(206),
                    Check::header_equals("Content-Length", "100"),
                    Check::body_length(0),
                ]),
            )
            .into(),
        Scenario::http1("range: If-Range with past date")
            .request(
                request::conditional_range(path, "bytes=0-99", PAST),
                Check::status(206).or(Check::status(200).soft()),
            )
            .into(),
        Scenario::http1("range: If-Range with future date")
            .request(
                request::conditional_range(path, "bytes=0-99", FUTURE),
                Check::status_in([200, 206]),
            )
            .into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Http1ResponseReader;
    use crate::scenario::{Observation, Outcome};

    fn observe(method: &str, raw: &[u8]) -> Observation {
        let state = Http1ResponseReader::for_method(method).feed(raw);
        Observation::from_reader(state).expect("complete response")
    }

    fn check_of(case: &Case) -> Check {
        match case {
            Case::Single(s) => match &s.steps[1] {
                crate::scenario::Step::ExpectResponse { check, .. } => check.clone(),
                other => panic!("unexpected step {:?}", other),
            },
            Case::Parallel(_) => panic!("unexpected parallel case"),
        }
    }

    #[test]
    fn test_suffix_range_bounds_body() {
        let check = partial_at_most(100);
        let short = observe("GET", b"HTTP/1.1 206 Partial Content\r\nContent-Length: 40\r\n\r\n0123456789012345678901234567890123456789");
        assert!(check.evaluate(&short).is_pass());
        let full = observe("GET", b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
        assert!(check.evaluate(&full).is_fail());
    }

    #[test]
    fn test_multi_range_outcomes() {
        let cases = cases(&HarnessConfig::default());
        assert_eq!(cases.len(), 10);
        let check = check_of(&cases[6]);

        let multipart = observe(
            "GET",
            b"HTTP/1.1 206 Partial Content\r\nContent-Type: multipart/byteranges; boundary=x\r\nContent-Length: 0\r\n\r\n",
        );
        assert!(check.evaluate(&multipart).is_pass());

        let full = observe("GET", b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert!(check.evaluate(&full).is_pass());

        let single = observe("GET", b"HTTP/1.1 206 Partial Content\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(check.evaluate(&single).outcome, Outcome::Inconclusive);
    }

    #[test]
    fn test_head_range_expects_empty_body() {
        let cases = cases(&HarnessConfig::default());
        let check = check_of(&cases[7]);
        let head = observe("HEAD", b"HTTP/1.1 206 Partial Content\r\nContent-Length: 100\r\n\r\n");
        assert!(check.evaluate(&head).is_pass());
    }
}
