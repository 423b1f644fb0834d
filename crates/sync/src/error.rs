//! Error types for the collection sync engine
//!
//! `StoreError` is what a store adapter reports. The engine converts it into
//! `SyncError` before anything reaches the mutation API.

use crate::model::{CollectionKind, UserId};
use thiserror::Error;

/// Transport-level failure from a remote collection store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store returned status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed value at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced to callers of the sync engine
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// A collection load failed; that collection stays empty
    #[error("Failed to load {collection} for user {user_id}: {source}")]
    RemoteReadFailed {
        user_id: UserId,
        collection: CollectionKind,
        #[source]
        source: StoreError,
    },

    /// A mutation could not be persisted; in-memory state is unchanged
    #[error("Failed to write {path}: {source}")]
    RemoteWriteFailed {
        path: String,
        #[source]
        source: StoreError,
    },

    /// The collection's last load failed, so its remote value is unknown
    #[error("{collection} is unavailable until it is reloaded")]
    CollectionUnavailable { collection: CollectionKind },

    #[error("Invalid movie id: {0:?}")]
    InvalidMovieId(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

impl SyncError {
    /// Collection the error refers to, when there is one
    pub fn collection(&self) -> Option<CollectionKind> {
        match self {
            SyncError::RemoteReadFailed { collection, .. }
            | SyncError::CollectionUnavailable { collection } => Some(*collection),
            SyncError::RemoteWriteFailed { .. }
            | SyncError::InvalidMovieId(_)
            | SyncError::InvalidUserId(_) => None,
        }
    }
}
