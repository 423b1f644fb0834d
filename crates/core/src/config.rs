//! Shared configuration loader module for Movie Shelf crates
//!
//! This module provides a unified configuration loading system with environment variable
//! parsing, validation, and support for .env files. All configuration uses the
//! `MOVIE_SHELF_` prefix for environment variables.
//!
//! # Features
//!
//! - Environment variable parsing with typed values
//! - .env file support via dotenvy
//! - Configuration validation with clear error messages
//! - Default values for optional fields
//! - Configuration override hierarchy: defaults < .env < environment
//!
//! # Example
//!
//! ```no_run
//! use movie_shelf_core::config::{load_dotenv, ConfigLoader, StoreConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! load_dotenv();
//!
//! let store_config = StoreConfig::from_env()?;
//! store_config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::ShelfError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if required variables are missing or
    /// values cannot be parsed.
    fn from_env() -> Result<Self, ShelfError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if any validation check fails.
    fn validate(&self) -> Result<(), ShelfError>;
}

/// Remote collection store configuration
///
/// Configuration for the path-addressed document store that persists per-user
/// collections.
///
/// # Environment Variables
///
/// - `MOVIE_SHELF_STORE_URL` (required): Base URL of the document store
/// - `MOVIE_SHELF_STORE_AUTH_TOKEN` (optional): Token sent as the `auth` query parameter
/// - `MOVIE_SHELF_STORE_TIMEOUT` (optional): Request timeout in seconds (default: 10)
/// - `MOVIE_SHELF_STORE_ROOT` (optional): Namespace root for user documents (default: "users")
///
/// # Example
///
/// ```bash
/// export MOVIE_SHELF_STORE_URL="https://movie-app.firebaseio.com"
/// export MOVIE_SHELF_STORE_TIMEOUT="5"
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the document store
    pub url: String,
    /// Optional auth token
    pub auth_token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Namespace root under which `{user_id}/...` documents live
    pub root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(10),
            root: "users".to_string(),
        }
    }
}

impl ConfigLoader for StoreConfig {
    fn from_env() -> Result<Self, ShelfError> {
        let url = std::env::var("MOVIE_SHELF_STORE_URL").map_err(|_| {
            ShelfError::config_key("MOVIE_SHELF_STORE_URL must be set", "MOVIE_SHELF_STORE_URL")
        })?;

        let auth_token = std::env::var("MOVIE_SHELF_STORE_AUTH_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let timeout_secs = parse_env_var("MOVIE_SHELF_STORE_TIMEOUT", 10u64)?;

        let root = std::env::var("MOVIE_SHELF_STORE_ROOT")
            .unwrap_or_else(|_| StoreConfig::default().root);

        Ok(Self {
            url,
            auth_token,
            request_timeout: Duration::from_secs(timeout_secs),
            root,
        })
    }

    fn validate(&self) -> Result<(), ShelfError> {
        let parsed = Url::parse(&self.url).map_err(|e| {
            ShelfError::config_key(
                format!("Invalid MOVIE_SHELF_STORE_URL: {}", e),
                "MOVIE_SHELF_STORE_URL",
            )
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ShelfError::config_key(
                format!("Unsupported store URL scheme: {}", parsed.scheme()),
                "MOVIE_SHELF_STORE_URL",
            ));
        }

        if self.request_timeout.as_secs() == 0 {
            return Err(ShelfError::config_key(
                "request_timeout must be greater than 0 seconds",
                "MOVIE_SHELF_STORE_TIMEOUT",
            ));
        }

        if self.root.is_empty() || self.root.contains('/') {
            return Err(ShelfError::config_key(
                format!("root must be a single non-empty path segment, got {:?}", self.root),
                "MOVIE_SHELF_STORE_ROOT",
            ));
        }

        Ok(())
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T>(key: &str, default: T) -> Result<T, ShelfError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ShelfError::config_key(format!("Failed to parse {}: {}", key, e), key))
        })
        .unwrap_or(Ok(default))
}

/// Load .env file if present
///
/// Does not return an error if the .env file is not found.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }
}
