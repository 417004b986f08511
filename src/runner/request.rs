//! Request construction.
//!
//! Pure translation from a resolved statement plus shared query
//! context into a concrete request descriptor. No concurrency, no IO.

use std::collections::HashSet;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use crate::client::HttpRequest;
use crate::domain::{QueryContext, Statement};

/// Process-wide request defaults from configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    /// Timeout applied when the statement declares none.
    pub resource_timeout: Duration,
    /// Caller parameters and headers with this prefix are forwarded
    /// verbatim to every downstream call.
    pub forward_prefix: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no mapping found for resource `{0}`")]
    UnknownResource(String),
}

/// Build the downstream request for one statement.
pub fn build_request(
    defaults: &RequestDefaults,
    statement: &Statement,
    ctx: &QueryContext,
) -> Result<HttpRequest, RequestError> {
    let mapping = ctx
        .mappings
        .get(&statement.resource)
        .ok_or_else(|| RequestError::UnknownResource(statement.resource.clone()))?;

    let mut url = mapping.url().clone();
    let consumed = expand_path(&mut url, mapping.path_params(), statement);

    let mut query_params: IndexMap<String, Value> = IndexMap::new();
    if !statement.method.has_body() {
        for (name, param) in &statement.with.values {
            if consumed.contains(name.as_str()) {
                continue;
            }
            if let Some(value) = param.as_value() {
                query_params.insert(name.clone(), value.clone());
            }
        }
    }
    if let Some(prefix) = &defaults.forward_prefix {
        for (name, value) in &ctx.input.params {
            if name.starts_with(prefix.as_str()) {
                query_params.insert(name.clone(), value.clone());
            }
        }
    }
    apply_query(&mut url, &query_params);

    let mut headers = std::collections::HashMap::new();
    if let Some(prefix) = &defaults.forward_prefix {
        for (name, value) in &ctx.input.headers {
            if name.starts_with(prefix.as_str()) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
    for (name, value) in &statement.headers {
        headers.insert(name.clone(), value.clone());
    }

    let body = if statement.method.has_body() {
        statement.with.body.clone().or_else(|| {
            let values: serde_json::Map<String, Value> = statement
                .with
                .values
                .iter()
                .filter(|(name, _)| !consumed.contains(name.as_str()))
                .filter_map(|(name, param)| {
                    param.as_value().map(|v| (name.clone(), v.clone()))
                })
                .collect();
            if values.is_empty() { None } else { Some(Value::Object(values)) }
        })
    } else {
        None
    };

    let timeout = statement
        .timeout
        .map(Duration::from_millis)
        .unwrap_or(defaults.resource_timeout);

    Ok(HttpRequest {
        method: statement.method,
        url,
        headers,
        query_params,
        body,
        timeout,
    })
}

/// Substitute `:name` path segments from statement parameters.
/// Returns the parameter names consumed by the path.
fn expand_path<'a>(
    url: &mut url::Url,
    path_params: &'a [String],
    statement: &Statement,
) -> HashSet<&'a str> {
    let mut consumed = HashSet::new();
    if path_params.is_empty() {
        return consumed;
    }

    let segments: Vec<String> = url
        .path_segments()
        .into_iter()
        .flatten()
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => match statement.with.values.get(name).and_then(|p| p.as_value()) {
                Some(value) => {
                    if let Some(declared) = path_params.iter().find(|p| p.as_str() == name) {
                        consumed.insert(declared.as_str());
                    }
                    scalar_string(value)
                }
                None => segment.to_string(),
            },
            None => segment.to_string(),
        })
        .collect();

    url.set_path(&segments.join("/"));
    consumed
}

fn apply_query(url: &mut url::Url, params: &IndexMap<String, Value>) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (name, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.append_pair(name, &scalar_string(item));
                }
            }
            other => {
                pairs.append_pair(name, &scalar_string(other));
            }
        }
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
