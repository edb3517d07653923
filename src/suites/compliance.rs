//! HTTP/1.1 message and connection semantics (RFC 7230, RFC 7231)

use crate::config::HarnessConfig;
use crate::http::{Method, RawRequest, RequestBuilder};
use crate::scenario::{Case, Check, CloseAnchor, Scenario, Step};
use std::time::Duration;

fn close(builder: RequestBuilder) -> RawRequest {
    builder.header("Connection", "close").build()
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let resource = config.resource.as_str();

    let keep_alive = Scenario::http1("compliance: keep-alive sequencing")
        .request(
            RequestBuilder::get("/").build(),
            Check::status(200).and(Check::header_contains("Connection", "keep-alive").soft()),
        )
        .step(Step::Wait(Duration::from_millis(500)))
        .request(RequestBuilder::get(resource).build(), Check::status(200))
        .request(
            close(RequestBuilder::get("/")),
            Check::status(200).and(Check::header_contains("Connection", "close")),
        )
        .step(Step::ExpectClose {
            not_before: Duration::ZERO,
            within: config.response_timeout,
            from: CloseAnchor::LastByte,
        });

    let idempotent = Scenario::http1("compliance: repeated GET")
        .request(close(RequestBuilder::get(resource)), Check::status(200))
        .step(Step::Reconnect)
        .request(
            close(RequestBuilder::get(resource)),
            Check::status(200).and(Check::same_as_previous()),
        );

    vec![
        Scenario::http1("compliance: HTTP/1.1 without Host")
            .request(RequestBuilder::get("/").omit_host().build(), Check::status(400))
            .into(),
        Scenario::http1("compliance: HTTP/1.1 with Host")
            .request(close(RequestBuilder::get("/")), Check::status(200))
            .into(),
        Scenario::http1("compliance: HTTP/1.0 without Host")
            .request(
                RequestBuilder::get("/").version("HTTP/1.0").omit_host().build(),
                Check::status(200),
            )
            .into(),
        Scenario::http1("compliance: OPTIONS *")
            .request(
                close(RequestBuilder::new(Method::Options, "*")),
                Check::status(200).and(Check::header_present("Allow")),
            )
            .into(),
        Scenario::http1("compliance: HEAD has no body")
            .request(
                close(RequestBuilder::new(Method::Head, resource)),
                Check::status(200).and(Check::body_length(0)),
            )
            .into(),
        Scenario::http1("compliance: PATCH")
            .request(close(RequestBuilder::new(Method::Patch, "/")), Check::status_in([405, 501]))
            .into(),
        Scenario::http1("compliance: TRACE")
            .request(
                close(RequestBuilder::new(Method::Trace, "/")),
                Check::status(405).and(Check::header_present("Allow").soft()),
            )
            .into(),
        Scenario::http1("compliance: HTTP/2.0 request line")
            .request(RequestBuilder::get("/").version("HTTP/2.0").build(), Check::status(505))
            .into(),
        Scenario::http1("compliance: Connection close honoured")
            .request(
                close(RequestBuilder::get("/")),
                Check::header_contains("Connection", "close"),
            )
            .step(Step::ExpectClose {
                not_before: Duration::ZERO,
                within: config.response_timeout,
                from: CloseAnchor::LastByte,
            })
            .into(),
        Scenario::http1("compliance: If-Modified-Since")
            .request(
                close(RequestBuilder::get(resource).header("If-Modified-Since", "Wed, 01 Jan 2025 00:00:00 GMT")),
                Check::status_in([304, 200]),
            )
            .into(),
        Scenario::http1("compliance: POST without length")
            .request(close(RequestBuilder::new(Method::Post, "/test")), Check::status(411))
            .into(),
        Scenario::http1("compliance: Date and Server headers")
            .request(
                close(RequestBuilder::get("/")),
                Check::header_present("Date").and(Check::header_present("Server")),
            )
            .into(),
        keep_alive.into(),
        idempotent.into(),
    ]
}
