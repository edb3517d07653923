//! HTTP/2 frame-level probes
//!
//! Scenarios run over TLS with ALPN `h2` on the configured TLS port.

use crate::config::HarnessConfig;
use crate::http::h2::{hpack, request_headers, ErrorCode, SettingsParameter};
use crate::scenario::{Case, EventCheck, FrameAction, Scenario, Step, StreamRef};

/// Largest literal that still fits a 4096 byte dynamic table.
const BOMB_ENTRY_SIZE: usize = 4000;
/// Decoded header list size as a multiple of the advertised limit.
const BOMB_AMPLIFICATION: usize = 64;

fn get(config: &HarnessConfig, path: &str) -> Vec<(String, String)> {
    request_headers("GET", "https", &config.host, path)
}

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let t = &config.thresholds;
    let initiate = || Step::SendFrame(FrameAction::Initiate);

    let normal = Scenario::http2("h2: normal request")
        .step(initiate())
        .step(Step::open_stream(get(config, &config.resource), true))
        .step(Step::ExpectEvent(EventCheck::all_of([
            EventCheck::Status {
                stream: StreamRef::Last,
                status: 200,
            },
            EventCheck::StreamEnded(StreamRef::Last),
        ])));

    let rapid_reset = Scenario::http2("h2: rapid reset")
        .step(initiate())
        .step(Step::Repeat {
            times: t.rapid_reset_attempts as usize,
            steps: vec![
                Step::open_stream(get(config, "/"), true),
                Step::reset(StreamRef::Last, ErrorCode::Cancel),
            ],
        })
        .step(Step::ExpectEvent(EventCheck::TerminatedWithinResets(
            t.rapid_reset_pass_boundary() as u64,
        )));

    let settings = Scenario::http2("h2: HPACK limits advertised")
        .step(initiate())
        .step(Step::ExpectEvent(EventCheck::all_of([
            EventCheck::SettingAtMost(SettingsParameter::HeaderTableSize, t.hpack_table_limit),
            EventCheck::SettingAtMost(SettingsParameter::MaxHeaderListSize, t.hpack_list_limit),
        ])));

    let references = t.hpack_list_limit as usize * BOMB_AMPLIFICATION / hpack::bomb_expansion(BOMB_ENTRY_SIZE, 0);
    let bomb = Scenario::http2("h2: HPACK bomb")
        .step(initiate())
        .step(Step::SendFrame(FrameAction::OpenStreamRaw {
            block: hpack::bomb_block("https", &config.host, BOMB_ENTRY_SIZE, references),
            end_stream: true,
        }))
        .step(Step::ExpectEvent(EventCheck::any_of([
            EventCheck::TerminatedOrReset,
            EventCheck::StatusClass {
                stream: StreamRef::Last,
                class: 4,
            },
        ])));

    vec![normal.into(), rapid_reset.into(), settings.into(), bomb.into()]
}
