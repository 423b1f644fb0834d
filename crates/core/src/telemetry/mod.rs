//! Structured logging and span helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use movie_shelf_core::telemetry::{init_tracing, TracingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing(TracingConfig::from_env())?;
//!     Ok(())
//! }
//! ```

pub mod tracing;

pub use self::tracing::{init_tracing, store_op_span, TracingConfig};
