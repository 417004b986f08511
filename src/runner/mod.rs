//! Statement execution engine.
//!
//! # Data Flow
//! ```text
//! resolved statement + query context
//!     → request.rs (build the downstream request descriptor)
//!     → [resource client performs the call]
//!     → outcome.rs (classify response/error into a DoneResource)
//!     → executor.rs (drives singles and bounded fan-out batches)
//! ```

pub mod executor;
pub mod outcome;
pub mod request;

pub use executor::{ExecuteError, Executor};
pub use outcome::DoneResourceOptions;
pub use request::{build_request, RequestDefaults, RequestError};
