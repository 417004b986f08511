//! Statement and query-context types.
//!
//! A query plan arrives with every statement already resolved: the
//! upstream evaluator has substituted chained values and marked the
//! parameters whose chain produced nothing. The types here are
//! immutable inputs to the executor.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Downstream call verb, mapped onto HTTP methods by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Read a resource (GET).
    From,
    /// Create a resource (POST).
    To,
    /// Replace a resource (PUT).
    Into,
    /// Partially update a resource (PATCH).
    Update,
    /// Remove a resource (DELETE).
    Delete,
}

impl Method {
    /// Whether statement parameters travel in the request body
    /// rather than the query string.
    pub fn has_body(self) -> bool {
        matches!(self, Method::To | Method::Into | Method::Update)
    }
}

/// How a chained parameter resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainResolution {
    /// The upstream statement produced no value for this parameter.
    Empty,
}

/// Marker left by the variable evaluator on a chain-sourced parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedParam {
    #[serde(rename = "__chained")]
    pub resolution: ChainResolution,
}

/// A statement input parameter: either a concrete resolved value or a
/// chained parameter that resolved to nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Chained(ChainedParam),
    Value(Value),
}

impl ParamValue {
    pub fn is_empty_chained(&self) -> bool {
        matches!(
            self,
            ParamValue::Chained(ChainedParam { resolution: ChainResolution::Empty })
        )
    }

    /// The concrete value, if this parameter carries one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Value(v) => Some(v),
            ParamValue::Chained(_) => None,
        }
    }
}

/// Statement input parameters and optional raw body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Explicit request body, used as-is for write methods.
    pub body: Option<Value>,
    /// Named parameters, in declaration order.
    pub values: IndexMap<String, ParamValue>,
}

/// Statement-declared cache-control hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheControlHint {
    pub max_age: Option<u64>,
    pub s_max_age: Option<u64>,
}

/// One declared call to a downstream resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statement {
    pub method: Method,
    pub resource: String,
    pub alias: Option<String>,
    pub with: Params,
    pub headers: HashMap<String, String>,
    /// Per-statement timeout override, milliseconds.
    pub timeout: Option<u64>,
    pub cache_control: CacheControlHint,
    pub ignore_errors: bool,
    pub hidden: bool,
}

impl Default for Statement {
    fn default() -> Self {
        Self {
            method: Method::From,
            resource: String::new(),
            alias: None,
            with: Params::default(),
            headers: HashMap::new(),
            timeout: None,
            cache_control: CacheControlHint::default(),
            ignore_errors: false,
            hidden: false,
        }
    }
}

impl Statement {
    /// The name this statement's result is keyed under.
    pub fn result_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.resource)
    }

    /// Names of chain-sourced parameters that resolved to nothing.
    /// A non-empty return means the call must be short-circuited.
    pub fn empty_chained_params(&self) -> Vec<String> {
        self.with
            .values
            .iter()
            .filter(|(_, v)| v.is_empty_chained())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// A plan element: a single statement or a fan-out over a list,
/// recursively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatementItem {
    Single(Statement),
    Fanout(Vec<StatementItem>),
}

impl StatementItem {
    /// The result name of the item: a fan-out is keyed by its first
    /// leaf statement.
    pub fn result_name(&self) -> Option<&str> {
        match self {
            StatementItem::Single(stmt) => Some(stmt.result_name()),
            StatementItem::Fanout(items) => items.iter().find_map(|i| i.result_name()),
        }
    }
}

/// Target of a resource name: a URL template whose `:name` path
/// segments are substituted from statement parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    url: Url,
    path_params: Vec<String>,
}

impl Mapping {
    pub fn new(template: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(template)?;
        let path_params = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter_map(|s| s.strip_prefix(':'))
            .map(str::to_owned)
            .collect();
        Ok(Self { url, path_params })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Parameter names consumed by path substitution.
    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }
}

/// Per-query options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub namespace: String,
    pub tenant: Option<String>,
}

/// Caller-supplied parameters and headers, shared by every statement.
#[derive(Debug, Clone, Default)]
pub struct QueryInput {
    pub params: IndexMap<String, Value>,
    pub headers: HashMap<String, String>,
}

/// Read-only shared state for one query execution.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub mappings: HashMap<String, Mapping>,
    pub options: QueryOptions,
    pub input: QueryInput,
}

impl QueryContext {
    /// Debug mode is requested with the `_debug` input parameter.
    pub fn debug_enabled(&self) -> bool {
        match self.input.params.get("_debug") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}
