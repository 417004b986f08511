//! Statement executor.
//!
//! # Responsibilities
//! - Short-circuit statements whose chained inputs resolved empty
//! - Dispatch downstream calls through the resource client
//! - Capture timeouts into outcomes; propagate other transport errors
//! - Run fan-out batches with bounded concurrency, preserving order
//!
//! # Design Decisions
//! - One permit pool per batch: the width bounds concurrency within a
//!   multiplexed statement, concurrent queries each get their own pool
//! - Batches join with fail-fast semantics; aborting drops the
//!   remaining futures, which releases permits and cancels in-flight
//!   calls, so an early abort cannot leak tasks or slots

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{try_join_all, BoxFuture};
use tokio::sync::Semaphore;

use crate::client::{ClientError, ResourceClient};
use crate::domain::{DoneResource, QueryContext, ResourceResult, Statement, StatementItem};
use crate::observability::metrics;

use super::outcome::{self, DoneResourceOptions};
use super::request::{self, RequestDefaults, RequestError};

/// Batch-level execution failure. Timeouts never surface here; they
/// are captured into the outcome so sibling statements keep running.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("executor worker pool closed")]
    PoolClosed,
}

/// Drives execution of resolved statements against downstream
/// resources. Cheap to share: one instance serves all queries.
pub struct Executor {
    client: Arc<dyn ResourceClient>,
    defaults: RequestDefaults,
    multiplex_width: usize,
}

impl Executor {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        resource_timeout: Duration,
        forward_prefix: Option<String>,
        multiplex_width: usize,
    ) -> Self {
        Self {
            client,
            defaults: RequestDefaults { resource_timeout, forward_prefix },
            multiplex_width,
        }
    }

    /// Execute one plan element, single or fan-out.
    pub async fn execute(
        &self,
        item: &StatementItem,
        ctx: &QueryContext,
    ) -> Result<ResourceResult, ExecuteError> {
        self.execute_item(item, ctx).await
    }

    /// Execute a single statement.
    pub async fn execute_statement(
        &self,
        statement: &Statement,
        ctx: &QueryContext,
    ) -> Result<DoneResource, ExecuteError> {
        let options = DoneResourceOptions {
            debug: ctx.debug_enabled(),
            ignore_errors: statement.ignore_errors,
            hidden: statement.hidden,
            max_age: statement.cache_control.max_age,
            s_max_age: statement.cache_control.s_max_age,
        };

        let empty_chained = statement.empty_chained_params();
        if !empty_chained.is_empty() {
            tracing::debug!(
                resource = %statement.resource,
                params = ?empty_chained,
                "request skipped due to empty chained parameters"
            );
            return Ok(outcome::empty_chained(&empty_chained, options));
        }

        let request = request::build_request(&self.defaults, statement, ctx)?;
        tracing::debug!(
            resource = %statement.resource,
            method = ?statement.method,
            url = %request.url,
            "executing request for statement"
        );

        let started = Instant::now();
        let result = self.client.execute(&request).await;
        metrics::record_statement_duration(&statement.resource, started.elapsed());

        match result {
            Ok(response) => Ok(outcome::from_response(&request, response, options)),
            Err(err) if err.is_timeout() => {
                metrics::record_statement_timeout(&statement.resource);
                tracing::debug!(resource = %statement.resource, "request timed out");
                Ok(outcome::from_error(&err, &request, options))
            }
            Err(err) => {
                tracing::debug!(resource = %statement.resource, error = %err, "request failed");
                Err(ExecuteError::Client(err))
            }
        }
    }

    /// Execute a fan-out batch. Results land in input order regardless
    /// of completion order; the first non-timeout failure aborts the
    /// whole batch.
    pub async fn execute_multiplexed(
        &self,
        items: &[StatementItem],
        ctx: &QueryContext,
    ) -> Result<Vec<ResourceResult>, ExecuteError> {
        let pool = Arc::new(Semaphore::new(self.multiplex_width));
        let batch = items.iter().map(|item| {
            let pool = Arc::clone(&pool);
            async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|_| ExecuteError::PoolClosed)?;
                self.execute_item(item, ctx).await
            }
        });

        try_join_all(batch).await
    }

    fn execute_item<'a>(
        &'a self,
        item: &'a StatementItem,
        ctx: &'a QueryContext,
    ) -> BoxFuture<'a, Result<ResourceResult, ExecuteError>> {
        Box::pin(async move {
            match item {
                StatementItem::Single(statement) => {
                    let done = self.execute_statement(statement, ctx).await?;
                    Ok(ResourceResult::One(done))
                }
                StatementItem::Fanout(items) => {
                    let results = self.execute_multiplexed(items, ctx).await?;
                    Ok(ResourceResult::Many(results))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpRequest, HttpResponse};
    use crate::domain::{Mapping, Method, ParamValue};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Handler =
        Box<dyn Fn(&HttpRequest) -> (Duration, Result<HttpResponse, ClientError>) + Send + Sync>;

    struct StubClient {
        calls: AtomicUsize,
        handler: Handler,
    }

    impl StubClient {
        fn new(
            handler: impl Fn(&HttpRequest) -> (Duration, Result<HttpResponse, ClientError>)
                + Send
                + Sync
                + 'static,
        ) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), handler: Box::new(handler) })
        }
    }

    #[async_trait]
    impl ResourceClient for StubClient {
        async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = (self.handler)(request);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn ok_response(body: Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Some(body),
            elapsed: Duration::from_millis(1),
        }
    }

    fn context() -> QueryContext {
        let mut ctx = QueryContext::default();
        ctx.mappings
            .insert("hero".into(), Mapping::new("http://hero.api/hero").unwrap());
        ctx
    }

    fn executor(client: Arc<dyn ResourceClient>) -> Executor {
        Executor::new(client, Duration::from_millis(1000), None, 10)
    }

    fn statement_with_param(name: &str, value: Value) -> Statement {
        let mut stmt = Statement {
            method: Method::From,
            resource: "hero".into(),
            ..Statement::default()
        };
        stmt.with.values.insert(name.into(), ParamValue::Value(value));
        stmt
    }

    fn query_param(request: &HttpRequest, name: &str) -> Option<Value> {
        request.query_params.get(name).cloned()
    }

    #[tokio::test]
    async fn test_empty_chained_statement_never_calls_client() {
        let client = StubClient::new(|_| (Duration::ZERO, Ok(ok_response(json!({})))));
        let exec = executor(client.clone());

        let mut stmt = Statement {
            method: Method::From,
            resource: "hero".into(),
            ..Statement::default()
        };
        stmt.with.values.insert(
            "id".into(),
            serde_json::from_value(json!({"__chained": "empty"})).unwrap(),
        );

        let done = exec.execute_statement(&stmt, &context()).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(done.status, 200);
        assert!(done.success);
        assert_eq!(done.body, None);
    }

    #[tokio::test]
    async fn test_timeout_is_captured_not_propagated() {
        let client = StubClient::new(|request| {
            if query_param(request, "slow").is_some() {
                (Duration::ZERO, Err(ClientError::Timeout(Duration::from_millis(100))))
            } else {
                (Duration::ZERO, Ok(ok_response(json!({"ok": true}))))
            }
        });
        let exec = executor(client);

        let items = vec![
            StatementItem::Single(statement_with_param("slow", json!(true))),
            StatementItem::Single(statement_with_param("id", json!(1))),
        ];
        let results = exec.execute_multiplexed(&items, &context()).await.unwrap();

        match (&results[0], &results[1]) {
            (ResourceResult::One(timed_out), ResourceResult::One(done)) => {
                assert_eq!(timed_out.status, 408);
                assert!(!timed_out.success);
                assert_eq!(done.status, 200);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_aborts_batch() {
        let client = StubClient::new(|request| {
            if query_param(request, "broken").is_some() {
                (Duration::ZERO, Err(ClientError::Transport("connection refused".into())))
            } else {
                (Duration::from_millis(5), Ok(ok_response(json!({}))))
            }
        });
        let exec = executor(client);

        let items = vec![
            StatementItem::Single(statement_with_param("id", json!(1))),
            StatementItem::Single(statement_with_param("broken", json!(true))),
            StatementItem::Single(statement_with_param("id", json!(3))),
        ];

        let err = exec.execute_multiplexed(&items, &context()).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Client(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fanout_preserves_input_order() {
        let client = StubClient::new(|request| {
            let idx = query_param(request, "idx")
                .and_then(|v| v.as_u64())
                .unwrap();
            // Later elements finish earlier.
            let delay = Duration::from_millis((100 - idx) % 7);
            (delay, Ok(ok_response(json!({"idx": idx}))))
        });
        let exec = executor(client.clone());

        let items: Vec<StatementItem> = (0..100)
            .map(|i| StatementItem::Single(statement_with_param("idx", json!(i))))
            .collect();

        let results = exec.execute_multiplexed(&items, &context()).await.unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 100);

        for (i, result) in results.iter().enumerate() {
            match result {
                ResourceResult::One(done) => {
                    assert_eq!(done.body, Some(json!({"idx": i})));
                }
                other => panic!("unexpected result at {i}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_nested_fanout_mirrors_statement_shape() {
        let client = StubClient::new(|_| (Duration::ZERO, Ok(ok_response(json!({})))));
        let exec = executor(client);

        let item = StatementItem::Fanout(vec![
            StatementItem::Fanout(vec![
                StatementItem::Single(statement_with_param("id", json!(1))),
                StatementItem::Single(statement_with_param("id", json!(2))),
            ]),
            StatementItem::Single(statement_with_param("id", json!(3))),
        ]);

        let result = exec.execute(&item, &context()).await.unwrap();
        match result {
            ResourceResult::Many(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], ResourceResult::Many(inner) if inner.len() == 2));
                assert!(matches!(&children[1], ResourceResult::One(_)));
            }
            other => panic!("expected fan-out result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_resource_is_batch_error() {
        let client = StubClient::new(|_| (Duration::ZERO, Ok(ok_response(json!({})))));
        let exec = executor(client);

        let stmt = Statement {
            method: Method::From,
            resource: "ghost".into(),
            ..Statement::default()
        };
        let err = exec.execute_statement(&stmt, &context()).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Request(RequestError::UnknownResource(_))));
    }

    #[tokio::test]
    async fn test_concurrency_stays_within_pool_width() {
        struct GaugeClient {
            current: AtomicUsize,
            max_seen: AtomicUsize,
        }

        #[async_trait]
        impl ResourceClient for GaugeClient {
            async fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse, ClientError> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(ok_response(json!({})))
            }
        }

        let client = Arc::new(GaugeClient {
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let exec = executor(client.clone());

        let items: Vec<StatementItem> = (0..50)
            .map(|i| StatementItem::Single(statement_with_param("idx", json!(i))))
            .collect();
        exec.execute_multiplexed(&items, &context()).await.unwrap();

        assert!(client.max_seen.load(Ordering::SeqCst) <= 10);
    }
}
