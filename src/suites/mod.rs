//! Built-in scenario catalogue
//!
//! Every suite turns a [`HarnessConfig`] into a list of [`Case`]s. Limits
//! and timing windows come from [`Thresholds`](crate::config::Thresholds),
//! so the same catalogue can be pointed at differently configured servers.

use crate::config::HarnessConfig;
use crate::scenario::Case;

pub mod auth;
pub mod compliance;
pub mod h2;
pub mod limits;
pub mod range;
pub mod slowloris;
pub mod smuggling;
pub mod traversal;

/// Suite names in run order.
pub const NAMES: [&str; 8] = [
    "compliance",
    "smuggling",
    "limits",
    "range",
    "traversal",
    "auth",
    "h2",
    "slowloris",
];

/// Cases of the suite called `name`.
pub fn by_name(name: &str, config: &HarnessConfig) -> Option<Vec<Case>> {
    let cases = match name {
        "compliance" => compliance::cases(config),
        "smuggling" => smuggling::cases(config),
        "limits" => limits::cases(config),
        "range" => range::cases(config),
        "traversal" => traversal::cases(config),
        "auth" => auth::cases(config),
        "h2" => h2::cases(config),
        "slowloris" => slowloris::cases(config),
        _ => return None,
    };
    Some(cases)
}

/// Every suite, in [`NAMES`] order.
pub fn all(config: &HarnessConfig) -> Vec<Case> {
    NAMES
        .iter()
        .filter_map(|name| by_name(name, config))
        .flatten()
        .collect()
}
