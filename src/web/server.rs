//! HTTP server setup and query handling.
//!
//! # Responsibilities
//! - Create the Axum router with the query and health handlers
//! - Extract the query context (namespace, caller params and headers)
//! - Drive the executor over every statement of the plan
//! - Translate the aggregate into the final HTTP response

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::client::{ClientError, ResourceClient};
use crate::config::GatewayConfig;
use crate::domain::{Mapping, QueryContext, QueryOptions, Resources, StatementItem};
use crate::observability::metrics;
use crate::runner::{ExecuteError, Executor, RequestError};
use crate::web::response::make_query_response;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub mappings: Arc<HashMap<String, Mapping>>,
    pub allow_debug: bool,
}

/// A resolved query plan, as produced by the upstream evaluator.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPlan {
    pub statements: Vec<StatementItem>,
}

/// HTTP server for the aggregation gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, client: Arc<dyn ResourceClient>) -> Self {
        let executor = Arc::new(Executor::new(
            client,
            Duration::from_millis(config.executor.resource_timeout_ms),
            config.executor.forward_prefix.clone(),
            config.executor.multiplex_concurrency,
        ));
        let state = AppState {
            executor,
            mappings: Arc::new(config.parsed_mappings()),
            allow_debug: config.web.allow_debug,
        };

        let router = build_router(config, state);
        Self { router }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("gateway server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    Router::new()
        .route("/run-query/{namespace}", post(run_query))
        .route("/health", get(health))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_millis(config.web.query_timeout_ms)))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn run_query(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(plan): Json<QueryPlan>,
) -> Response {
    let started = Instant::now();
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ctx = build_context(&state, namespace, params, &headers);
    let debug = ctx.debug_enabled();

    let mut resources = Resources::new();
    for (position, item) in plan.statements.iter().enumerate() {
        let name = item
            .result_name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("statement-{position}"));

        match state.executor.execute(item, &ctx).await {
            Ok(result) => {
                resources.insert(name, result);
            }
            Err(err) => {
                tracing::warn!(request_id = %request_id, resource = %name, error = %err, "query execution aborted");
                let status = error_status(&err);
                metrics::record_query(status.as_u16(), started.elapsed());
                return (status, Json(json!({"error": err.to_string()}))).into_response();
            }
        }
    }

    // Aggregation over a complete tree cannot fail; the error channel
    // exists for forward compatibility.
    let query_response = match make_query_response(&resources, debug) {
        Ok(response) => response,
        Err(err) => match err {},
    };

    tracing::info!(
        request_id = %request_id,
        status = query_response.status_code,
        statements = plan.statements.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query executed"
    );
    metrics::record_query(query_response.status_code, started.elapsed());

    let status = StatusCode::from_u16(query_response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(&query_response.body)).into_response();
    for (name, value) in &query_response.headers {
        if let (Ok(name), Ok(value)) =
            (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
        {
            response.headers_mut().insert(name, value);
        }
    }
    if let Ok(value) = HeaderValue::try_from(request_id.as_str()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn build_context(
    state: &AppState,
    namespace: String,
    params: HashMap<String, String>,
    headers: &HeaderMap,
) -> QueryContext {
    let mut ctx = QueryContext {
        mappings: state.mappings.as_ref().clone(),
        options: QueryOptions { namespace, tenant: None },
        ..QueryContext::default()
    };

    ctx.options.tenant = params.get("tenant").cloned();
    for (name, value) in params {
        if name == "_debug" && !state.allow_debug {
            continue;
        }
        ctx.input.params.insert(name, Value::String(value));
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx.input.headers.insert(name.to_string(), value.to_string());
        }
    }
    ctx
}

fn error_status(err: &ExecuteError) -> StatusCode {
    match err {
        ExecuteError::Request(RequestError::UnknownResource(_)) => StatusCode::BAD_REQUEST,
        ExecuteError::Client(ClientError::Transport(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
