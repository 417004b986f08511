//! Observability subsystem.
//!
//! # Responsibilities
//! - Initialize structured logging (tracing + env filter)
//! - Record gateway metrics (queries, statement latency, timeouts)

pub mod logging;
pub mod metrics;
