/// Mutation API consumed by presentational components
///
/// Validates movie ids and forwards to the sync engine. Views depend on this
/// type only.
use crate::engine::{CollectionSync, MutationOutcome};
use crate::error::SyncError;
use crate::model::MovieId;
use crate::state::CollectionSnapshot;
use tokio::sync::watch;
use tracing::warn;

#[derive(Clone)]
pub struct CollectionsApi {
    sync: CollectionSync,
}

impl CollectionsApi {
    pub fn new(sync: CollectionSync) -> Self {
        Self { sync }
    }

    /// Current read-only view of the collections
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.sync.snapshot()
    }

    /// Change notifications; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.sync.subscribe()
    }

    pub async fn add_to_favorites(&self, movie_id: &MovieId) -> Result<MutationOutcome, SyncError> {
        validate_movie_id(movie_id)?;
        self.sync.add_to_favorites(movie_id).await
    }

    pub async fn remove_from_favorites(
        &self,
        movie_id: &MovieId,
    ) -> Result<MutationOutcome, SyncError> {
        validate_movie_id(movie_id)?;
        self.sync.remove_from_favorites(movie_id).await
    }

    pub async fn add_to_must_watch(&self, movie_id: &MovieId) -> Result<MutationOutcome, SyncError> {
        validate_movie_id(movie_id)?;
        self.sync.add_to_must_watch(movie_id).await
    }

    pub async fn remove_from_must_watch(
        &self,
        movie_id: &MovieId,
    ) -> Result<MutationOutcome, SyncError> {
        validate_movie_id(movie_id)?;
        self.sync.remove_from_must_watch(movie_id).await
    }

    pub async fn upsert_review(
        &self,
        movie_id: &MovieId,
        review: &str,
    ) -> Result<MutationOutcome, SyncError> {
        validate_movie_id(movie_id)?;
        self.sync.upsert_review(movie_id, review).await
    }
}

/// Reject ids that are empty or cannot be used as a store path segment
pub fn validate_movie_id(movie_id: &MovieId) -> Result<(), SyncError> {
    if movie_id.is_well_formed() {
        Ok(())
    } else {
        warn!(movie_id = ?movie_id, "Rejected malformed movie id");
        Err(SyncError::InvalidMovieId(movie_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_movie_id() {
        assert!(validate_movie_id(&MovieId::Number(550)).is_ok());
        assert!(validate_movie_id(&MovieId::from("tt0137523")).is_ok());
        assert!(matches!(
            validate_movie_id(&MovieId::from("")),
            Err(SyncError::InvalidMovieId(_))
        ));
        assert!(validate_movie_id(&MovieId::from("users/2")).is_err());
    }
}
