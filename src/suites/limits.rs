//! Request size limits
//!
//! Each probe exceeds one configured limit by a clear margin; the server
//! must answer `413` or `431`. Two controls sit just inside the limits.

use crate::config::HarnessConfig;
use crate::http::{request, Method};
use crate::scenario::{Case, Check, Scenario};

const MIB: u64 = 1024 * 1024;

fn rejected() -> Check {
    Check::status(413).or(Check::status(431))
}

fn accepted() -> Check {
    Check::status_in([200, 404])
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let t = &config.thresholds;
    let stream_chunk = t.chunk_limit * 2;
    let stream_chunks = (t.body_limit / stream_chunk as u64) as usize + 1;

    vec![
        Scenario::http1("limits: header line too large")
            .request(request::oversized_header_line(t.header_line_limit + 808), rejected())
            .into(),
        Scenario::http1("limits: header block too large")
            .request(request::oversized_header_block(t.header_block_limit * 4 / 3), rejected())
            .into(),
        Scenario::http1("limits: too many headers")
            .request(request::many_headers(t.header_count_limit + 10), rejected())
            .into(),
        Scenario::http1("limits: declared POST body too large")
            .request(
                request::declared_body_without_payload(Method::Post, t.body_limit + MIB),
                rejected(),
            )
            .into(),
        Scenario::http1("limits: single chunk too large")
            .request(request::oversized_chunk(t.chunk_limit * 2, 1000), rejected())
            .into(),
        Scenario::http1("limits: chunked body too large")
            .request(request::chunked_stream(stream_chunk, stream_chunks), rejected())
            .into(),
        Scenario::http1("limits: declared PUT upload too large")
            .request(
                request::declared_body_without_payload(Method::Put, t.upload_limit + MIB),
                rejected(),
            )
            .into(),
        Scenario::http1("limits: header line within limit")
            .request(request::oversized_header_line(t.header_line_limit - 1024), accepted())
            .into(),
        Scenario::http1("limits: header count within limit")
            .request(request::many_headers(t.header_count_limit - 1), accepted())
            .into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FramingAnalysis;
    use crate::scenario::Step;

    fn first_request(case: &Case) -> crate::http::RawRequest {
        match case {
            Case::Single(scenario) => match &scenario.steps[0] {
                Step::SendRequest { request, .. } => request.clone(),
                other => panic!("unexpected first step {:?}", other),
            },
            Case::Parallel(_) => panic!("unexpected parallel case"),
        }
    }

    #[test]
    fn test_probes_follow_thresholds() {
        let config = HarnessConfig::default();
        let cases = cases(&config);
        assert_eq!(cases.len(), 9);

        let line = first_request(&cases[0]);
        assert!(line.head().len() > 9000);

        let block = first_request(&cases[1]);
        assert!(block.head().len() > config.thresholds.header_block_limit);
        assert!(block.headers().len() > 90);

        let post = first_request(&cases[3]);
        assert_eq!(post.framing(), FramingAnalysis::ContentLength(11 * MIB));
        assert!(post.body().is_empty());

        let stream = first_request(&cases[5]);
        assert_eq!(stream.framing(), FramingAnalysis::Chunked);
        assert!(stream.body().len() as u64 > config.thresholds.body_limit);

        let put = first_request(&cases[6]);
        assert_eq!(put.method, "PUT");
        assert_eq!(put.framing(), FramingAnalysis::ContentLength(101 * MIB));
    }
}
