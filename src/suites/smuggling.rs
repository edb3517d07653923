//! Request smuggling: ambiguous message framing must be rejected

use crate::config::HarnessConfig;
use crate::http::{request, Method, RequestBuilder};
use crate::scenario::{Case, Check, Scenario};

pub fn cases(_config: &HarnessConfig) -> Vec<Case> {
    let rejected_with = |needle: &str| Check::status(400).and(Check::mentions(needle));

    vec![
        Scenario::http1("smuggling: duplicate Content-Length")
            .request(request::duplicate_content_length("/"), rejected_with("duplicate"))
            .into(),
        Scenario::http1("smuggling: duplicate Transfer-Encoding")
            .request(request::duplicate_transfer_encoding("/"), rejected_with("duplicate"))
            .into(),
        Scenario::http1("smuggling: CL.TE")
            .request(request::cl_te("/"), rejected_with("mutually exclusive"))
            .into(),
        Scenario::http1("smuggling: TE.CL")
            .request(request::te_cl("/"), rejected_with("mutually exclusive"))
            .into(),
        Scenario::http1("smuggling: Transfer-Encoding chunked, identity")
            .request(
                request::transfer_encoding_variant("/", " chunked, identity"),
                Check::status(400).and(Check::mentions("invalid").or(Check::mentions("only"))),
            )
            .into(),
        // Surrounding whitespace is not part of the field value.
        Scenario::http1("smuggling: whitespace-padded chunked")
            .request(
                request::transfer_encoding_variant("/", "  chunked  "),
                Check::status(200).or(Check::mentions("chunked")),
            )
            .into(),
        Scenario::http1("smuggling: Transfer-Encoding identity with Content-Length")
            .request(request::identity_with_content_length("/"), Check::status(400))
            .into(),
        Scenario::http1("smuggling: valid chunked control")
            .request(
                RequestBuilder::new(Method::Post, "/")
                    .chunked_body(b"hello", 5)
                    .build(),
                Check::status(200).or(Check::mentions("hello")).soft(),
            )
            .into(),
        Scenario::http1("smuggling: valid Content-Length control")
            .request(
                RequestBuilder::new(Method::Post, "/").body("hello").build(),
                Check::status(200).or(Check::mentions("hello")).soft(),
            )
            .into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FramingAnalysis;
    use crate::scenario::Step;

    fn requests(cases: &[Case]) -> Vec<crate::http::RawRequest> {
        cases
            .iter()
            .filter_map(|case| match case {
                Case::Single(s) => s.steps.iter().find_map(|step| match step {
                    Step::SendRequest { request, .. } => Some(request.clone()),
                    _ => None,
                }),
                Case::Parallel(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_attacks_then_controls() {
        let cases = cases(&HarnessConfig::default());
        assert_eq!(cases.len(), 9);
        assert!(cases.iter().all(|c| c.name().starts_with("smuggling: ")));

        let requests = requests(&cases);
        assert_eq!(requests.len(), 9);
        assert!(matches!(requests[0].framing(), FramingAnalysis::ConflictingContentLength(_)));
        assert_eq!(requests[8].framing(), FramingAnalysis::ContentLength(5));
    }
}
