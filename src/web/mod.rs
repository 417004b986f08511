//! HTTP-facing layer.
//!
//! # Data Flow
//! ```text
//! POST /run-query/{namespace} (resolved query plan)
//!     → server.rs (extract context, drive the executor per statement)
//!     → [runner executes statements]
//!     → response.rs (aggregate outcomes into one client response)
//! ```

pub mod response;
pub mod server;

pub use response::{calculate_status_code, make_query_response, QueryResponse};
pub use server::GatewayServer;
