//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML, with
//! defaults on every section so a minimal config (or none) works.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::Mapping;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Statement execution settings.
    pub executor: ExecutorConfig,

    /// HTTP surface settings.
    pub web: WebConfig,

    /// Resource mappings: name → URL template. Path segments of the
    /// form `:param` are substituted from statement parameters.
    pub mappings: HashMap<String, String>,
}

impl GatewayConfig {
    /// Parse the configured mapping templates, skipping invalid ones.
    pub fn parsed_mappings(&self) -> HashMap<String, Mapping> {
        let mut mappings = HashMap::new();
        for (name, template) in &self.mappings {
            match Mapping::new(template) {
                Ok(mapping) => {
                    mappings.insert(name.clone(), mapping);
                }
                Err(err) => {
                    tracing::warn!(resource = %name, template = %template, error = %err, "invalid mapping skipped");
                }
            }
        }
        mappings
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:9090".to_string() }
    }
}

/// Statement execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default downstream timeout, milliseconds. Statements may
    /// override it individually.
    pub resource_timeout_ms: u64,

    /// Concurrency ceiling within one multiplexed statement.
    pub multiplex_concurrency: usize,

    /// Caller parameters/headers with this prefix are forwarded
    /// verbatim to every downstream call.
    pub forward_prefix: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            resource_timeout_ms: 5_000,
            multiplex_concurrency: 10,
            forward_prefix: None,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Global per-query timeout, milliseconds.
    pub query_timeout_ms: u64,

    /// Whether callers may request per-resource debug blocks with
    /// the `_debug` query parameter.
    pub allow_debug: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { query_timeout_ms: 30_000, allow_debug: false }
    }
}
