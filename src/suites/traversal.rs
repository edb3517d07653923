//! Path traversal: escaping the document root must be refused

use crate::config::HarnessConfig;
use crate::http::{traversal, RequestBuilder};
use crate::scenario::{Case, Check, Scenario};

pub fn cases(config: &HarnessConfig) -> Vec<Case> {
    let mut cases: Vec<Case> = traversal::vectors()
        .into_iter()
        .map(|vector| {
            Scenario::http1(format!("traversal: {}", vector.encoding))
                .request(vector.request(), Check::status_in([400, 403]))
                .into()
        })
        .collect();

    let mut controls = vec!["/".to_string()];
    if config.resource != "/" {
        controls.push(config.resource.clone());
    }
    for path in controls {
        cases.push(
            Scenario::http1(format!("traversal: {} still served", path))
                .request(RequestBuilder::get(path.as_str()).build(), Check::status(200))
                .into(),
        );
    }
    cases
}
