//! # Movie Shelf Core
//!
//! Ambient building blocks shared by the Movie Shelf crates.
//!
//! ## Modules
//!
//! - `error`: Error types and handling
//! - `config`: Configuration loading and validation
//! - `telemetry`: Structured logging initialization

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{load_dotenv, ConfigLoader, StoreConfig};
pub use error::ShelfError;
pub use telemetry::{init_tracing, TracingConfig};

/// Result type alias for Movie Shelf operations
pub type Result<T> = std::result::Result<T, ShelfError>;
