//! Core domain model.
//!
//! # Data Flow
//! ```text
//! resolved query plan (statements)
//!     → query.rs (Statement, QueryContext)
//!     → [runner executes each statement]
//!     → resource.rs (DoneResource outcomes, Resources map)
//!     → [web layer aggregates into one response]
//! ```

pub mod query;
pub mod resource;

pub use query::{
    CacheControlHint, ChainedParam, ChainResolution, Mapping, Method, Params, ParamValue,
    QueryContext, QueryInput, QueryOptions, Statement, StatementItem,
};
pub use resource::{flatten, DoneResource, ResourceCacheControl, ResourceResult, Resources};
