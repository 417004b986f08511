//! Metrics collection.
//!
//! # Metrics
//! - `gateway_queries_total` (counter): queries served, by status
//! - `gateway_query_duration_seconds` (histogram): end-to-end latency
//! - `gateway_statement_duration_seconds` (histogram): downstream
//!   latency, by resource
//! - `gateway_statement_timeouts_total` (counter): downstream
//!   timeouts, by resource

use std::time::Duration;

pub fn record_query(status: u16, elapsed: Duration) {
    metrics::counter!("gateway_queries_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("gateway_query_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_statement_duration(resource: &str, elapsed: Duration) {
    metrics::histogram!(
        "gateway_statement_duration_seconds",
        "resource" => resource.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_statement_timeout(resource: &str) {
    metrics::counter!(
        "gateway_statement_timeouts_total",
        "resource" => resource.to_string()
    )
    .increment(1);
}
