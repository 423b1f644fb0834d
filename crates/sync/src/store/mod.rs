//! Remote collection store abstraction
//!
//! Path-addressed get/set of JSON values under a per-user namespace:
//! `users/{user_id}/{favorites|mustWatch|reviews[/movie_id]}`.

pub mod memory;
pub mod rest;

use crate::error::StoreError;
use crate::model::{CollectionKind, MovieId, UserId};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub use memory::InMemoryCollectionStore;
pub use rest::RestCollectionStore;

/// Default namespace root for user documents
pub const DEFAULT_NAMESPACE: &str = "users";

/// Slash-separated document path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Path of a whole collection, e.g. `users/42/mustWatch`
    pub fn collection(root: &str, user_id: &UserId, kind: CollectionKind) -> Self {
        Self(format!("{}/{}/{}", root, user_id, kind.segment()))
    }

    /// Path of a single review, e.g. `users/42/reviews/550`
    pub fn review(root: &str, user_id: &UserId, movie_id: &MovieId) -> Self {
        Self(format!(
            "{}/{}/{}/{}",
            root,
            user_id,
            CollectionKind::Reviews.segment(),
            movie_id
        ))
    }

    /// Arbitrary path, mainly for seeding stores in tests
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability interface of the remote document store
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Value stored at `path`, `None` if nothing is stored there
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Replace the value stored at `path`
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;
}
