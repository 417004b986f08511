//! Execution outcomes.
//!
//! Every executed (or short-circuited) statement materializes into a
//! [`DoneResource`]. Fan-outs produce an ordered tree of outcomes that
//! mirrors the input list. The complete result of a query is a
//! [`Resources`] map, built once and then only read by the aggregator.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

/// Cache-control directives resolved for one outcome: the statement's
/// declared hints merged with the upstream response's own header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCacheControl {
    pub max_age: Option<u64>,
    pub s_max_age: Option<u64>,
    pub no_cache: bool,
}

/// The outcome of one statement against one target.
///
/// `success` is derived from the status code range and the absence of
/// a transport error, never from the body. The debug-only fields are
/// populated only when the query runs in debug mode; `response_headers`
/// is always kept because header propagation needs it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoneResource {
    pub status: u16,
    pub success: bool,
    pub ignore_errors: bool,
    pub hidden: bool,
    pub cache_control: ResourceCacheControl,
    /// Parsed response body; `None` is the empty sentinel.
    pub body: Option<Value>,
    pub response_headers: HashMap<String, String>,

    // Debug-only fields.
    pub url: Option<String>,
    pub request_headers: Option<HashMap<String, String>>,
    pub request_params: Option<IndexMap<String, Value>>,
    pub response_time_ms: Option<u64>,
}

/// The outcome of one plan element: a single resource or an ordered
/// fan-out tree, nested to match the statement shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceResult {
    One(DoneResource),
    Many(Vec<ResourceResult>),
}

impl ResourceResult {
    /// Collect every leaf outcome in order.
    pub fn leaves(&self) -> Vec<&DoneResource> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a DoneResource>) {
        match self {
            ResourceResult::One(done) => out.push(done),
            ResourceResult::Many(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// A result is hidden when every leaf carries the hidden flag.
    /// The flag is statement-level, so leaves of one result agree.
    pub fn is_hidden(&self) -> bool {
        let leaves = self.leaves();
        !leaves.is_empty() && leaves.iter().all(|d| d.hidden)
    }
}

/// Complete result of one query: resource name to outcome tree, in
/// statement order.
pub type Resources = IndexMap<String, ResourceResult>;

/// Flatten a resources map into its leaf outcomes, in entry order.
pub fn flatten(resources: &Resources) -> Vec<&DoneResource> {
    let mut out = Vec::new();
    for result in resources.values() {
        result.collect_leaves(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(status: u16) -> DoneResource {
        DoneResource { status, success: status < 400, ..DoneResource::default() }
    }

    #[test]
    fn test_flatten_preserves_every_leaf_in_order() {
        let mut resources = Resources::new();
        resources.insert(
            "hero".into(),
            ResourceResult::Many(vec![ResourceResult::Many(vec![
                ResourceResult::One(done(200)),
                ResourceResult::One(done(201)),
                ResourceResult::One(done(408)),
            ])]),
        );
        resources.insert("sidekick".into(), ResourceResult::One(done(204)));
        resources.insert("villain".into(), ResourceResult::One(done(400)));

        let statuses: Vec<u16> = flatten(&resources).iter().map(|d| d.status).collect();
        assert_eq!(statuses, vec![200, 201, 408, 204, 400]);
    }

    #[test]
    fn test_is_hidden_requires_all_leaves_hidden() {
        let hidden = DoneResource { hidden: true, ..done(200) };
        let result = ResourceResult::Many(vec![
            ResourceResult::One(hidden.clone()),
            ResourceResult::One(hidden),
        ]);
        assert!(result.is_hidden());

        let mixed = ResourceResult::Many(vec![
            ResourceResult::One(DoneResource { hidden: true, ..done(200) }),
            ResourceResult::One(done(200)),
        ]);
        assert!(!mixed.is_hidden());
    }
}
