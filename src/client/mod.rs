//! Downstream resource client seam.
//!
//! # Responsibilities
//! - Define the request/response descriptors exchanged with downstreams
//! - Distinguish timeout from other transport failures
//! - Hide the concrete HTTP client behind a trait so the executor can
//!   be driven by stubs in tests

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

use crate::domain::Method;

pub mod http;

pub use http::HttpResourceClient;

/// Concrete request descriptor produced by the request builder.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Final URL, query string included.
    pub url: Url,
    pub headers: HashMap<String, String>,
    /// Query parameters as sent, kept for debug reporting.
    pub query_params: IndexMap<String, Value>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Downstream response as seen by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Parsed JSON body; `None` when the body was absent or blank.
    pub body: Option<Value>,
    pub elapsed: Duration,
}

/// Failure of a single downstream call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("downstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("downstream request failed: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

/// Performs one HTTP call against a downstream resource.
/// Exactly one attempt per request: retries are out of scope.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}
