//! HTTP resource client over the hyper legacy pool.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;

use crate::domain::Method;

use super::{ClientError, HttpRequest, HttpResponse, ResourceClient};

/// Pooled HTTP/1.1 and HTTP/2 client shared by all queries.
#[derive(Clone)]
pub struct HttpResourceClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpResourceClient {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpResourceClient {
    fn default() -> Self {
        Self::new()
    }
}

fn http_method(method: Method) -> hyper::Method {
    match method {
        Method::From => hyper::Method::GET,
        Method::To => hyper::Method::POST,
        Method::Into => hyper::Method::PUT,
        Method::Update => hyper::Method::PATCH,
        Method::Delete => hyper::Method::DELETE,
    }
}

/// Parse a downstream body. Blank bodies are the empty sentinel;
/// non-JSON payloads are retained verbatim as a string value.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(trimmed.to_string())),
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let uri: hyper::Uri = request
            .url
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| ClientError::Transport(e.to_string()))?;

        let mut builder = hyper::Request::builder()
            .method(http_method(request.method))
            .uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let payload = match &request.body {
            Some(body) => {
                let has_content_type = request
                    .headers
                    .keys()
                    .any(|k| k.eq_ignore_ascii_case("content-type"));
                if !has_content_type {
                    builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
                }
                serde_json::to_vec(body).map_err(|e| ClientError::Transport(e.to_string()))?
            }
            None => Vec::new(),
        };

        let outgoing = builder
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let started = Instant::now();
        // The timeout covers the full exchange, body read included.
        let exchange = async {
            let response = self
                .client
                .request(outgoing)
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            let headers: HashMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?
                .to_bytes();

            Ok::<_, ClientError>((status, headers, bytes))
        };

        let (status, headers, bytes) = tokio::time::timeout(request.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(request.timeout))??;

        Ok(HttpResponse {
            status,
            headers,
            body: parse_body(&bytes),
            elapsed: started.elapsed(),
        })
    }
}
