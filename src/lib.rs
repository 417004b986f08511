//! API aggregation gateway library.
//!
//! Clients submit a resolved query plan: a list of named statements,
//! each targeting a downstream REST resource, possibly fanned out over
//! a list. The gateway executes the statements with bounded
//! concurrency, reconciles partial failures, and folds the outcomes
//! into one merged HTTP response.

pub mod client;
pub mod config;
pub mod domain;
pub mod observability;
pub mod runner;
pub mod web;

pub use config::GatewayConfig;
pub use runner::Executor;
pub use web::GatewayServer;
