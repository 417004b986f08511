//! Response aggregation.
//!
//! Folds the tree of outcomes for an entire query into one
//! client-facing response: overall status code, merged Cache-Control
//! directive, per-resource body and upstream header propagation.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{flatten, DoneResource, ResourceResult, Resources};

pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";

/// Aggregation cannot fail under normal conditions; the error channel
/// exists for forward compatibility of the contract.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {}

/// The final client-facing response for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub status_code: u16,
    pub body: IndexMap<String, StatementResult>,
    pub headers: HashMap<String, String>,
}

/// Per-resource entry of the response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementResult {
    pub details: Details,
    pub result: Option<Value>,
}

/// Details mirror the fan-out shape of the outcome tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Details {
    Single(StatementDetails),
    Many(Vec<Details>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementDetails {
    pub status: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StatementMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<StatementDebugging>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementMetadata {
    pub ignore_errors: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementDebugging {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HashMap<String, String>>,
    pub response_headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

/// Build the aggregate response. Hidden statements are excluded from
/// the body but still weigh on the status code and Cache-Control.
pub fn make_query_response(
    resources: &Resources,
    debug: bool,
) -> Result<QueryResponse, ResponseError> {
    let status_code = calculate_status_code(resources);

    let mut body = IndexMap::new();
    for (name, result) in resources {
        if result.is_hidden() {
            continue;
        }
        body.insert(
            name.clone(),
            StatementResult {
                details: details_of(result, debug),
                result: result_of(result),
            },
        );
    }

    Ok(QueryResponse { status_code, body, headers: make_headers(resources) })
}

/// Maximum status among leaves not marked ignore-errors. Any 2xx
/// aggregates as plain 200 so a 204 or 201 constituent cannot
/// override the overall success code. When every leaf is ignored
/// there is nothing left to aggregate and the response defaults
/// to 200.
pub fn calculate_status_code(resources: &Resources) -> u16 {
    flatten(resources)
        .iter()
        .filter(|done| !done.ignore_errors)
        .map(|done| normalize_status(done.status))
        .max()
        .unwrap_or(200)
}

fn normalize_status(status: u16) -> u16 {
    if (200..300).contains(&status) { 200 } else { status }
}

fn details_of(result: &ResourceResult, debug: bool) -> Details {
    match result {
        ResourceResult::One(done) => Details::Single(single_details(done, debug)),
        ResourceResult::Many(children) => {
            Details::Many(children.iter().map(|child| details_of(child, debug)).collect())
        }
    }
}

fn single_details(done: &DoneResource, debug: bool) -> StatementDetails {
    StatementDetails {
        status: done.status,
        success: done.success,
        metadata: done
            .ignore_errors
            .then(|| StatementMetadata { ignore_errors: "ignore".to_string() }),
        debug: debug.then(|| StatementDebugging {
            url: done.url.clone(),
            request_headers: done.request_headers.clone(),
            response_headers: done.response_headers.clone(),
            params: done.request_params.clone(),
            response_time_ms: done.response_time_ms,
        }),
    }
}

/// The parsed body, or an ordered sequence mirroring the fan-out.
/// A fan-out whose every element is empty collapses to the empty
/// sentinel instead of a list of nulls.
fn result_of(result: &ResourceResult) -> Option<Value> {
    match result {
        ResourceResult::One(done) => done.body.clone(),
        ResourceResult::Many(children) => {
            let items: Vec<Option<Value>> = children.iter().map(result_of).collect();
            if items.iter().all(Option::is_none) {
                return None;
            }
            Some(Value::Array(
                items.into_iter().map(|item| item.unwrap_or(Value::Null)).collect(),
            ))
        }
    }
}

/// Upstream headers of successful leaves, each key prefixed with the
/// resource name, plus the merged Cache-Control when any leaf
/// declares a directive. Failed leaves contribute no headers even
/// when ignore-errors is set.
fn make_headers(resources: &Resources) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, result) in resources {
        for done in result.leaves() {
            if !done.success {
                continue;
            }
            for (key, value) in &done.response_headers {
                headers.insert(format!("{name}-{key}"), value.clone());
            }
        }
    }

    if let Some(directive) = merged_cache_control(resources) {
        headers.insert(CACHE_CONTROL_HEADER.to_string(), directive);
    }
    headers
}

/// Per directive, the minimum over declaring leaves: the merged
/// response is only as fresh as its most volatile constituent.
/// `no-cache` on any leaf is exclusive and suppresses the numeric
/// directives.
fn merged_cache_control(resources: &Resources) -> Option<String> {
    let leaves = flatten(resources);

    if leaves.iter().any(|done| done.cache_control.no_cache) {
        return Some("no-cache".to_string());
    }

    let max_age = leaves.iter().filter_map(|done| done.cache_control.max_age).min();
    let s_max_age = leaves.iter().filter_map(|done| done.cache_control.s_max_age).min();

    let mut tokens = Vec::new();
    if let Some(age) = max_age {
        tokens.push(format!("max-age={age}"));
    }
    if let Some(age) = s_max_age {
        tokens.push(format!("s-maxage={age}"));
    }
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(", "))
    }
}
