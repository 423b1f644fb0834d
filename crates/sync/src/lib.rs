/// Movie Shelf Collection Sync
///
/// Keeps a user's favorites, must-watch list and reviews consistent between
/// an observable in-memory snapshot and a remote per-user document store.
///
/// Features:
/// - Load on sign-in, clear on sign-out, discard work from stale sessions
/// - Write-then-show mutations with idempotent set semantics
/// - Per-collection write serialization, per-key review writes
/// - In-memory and REST document store adapters
pub mod api;
pub mod codec;
pub mod engine;
pub mod error;
pub mod model;
pub mod session;
pub mod state;
pub mod store;

pub use api::{validate_movie_id, CollectionsApi};
pub use engine::{CollectionSync, LoadReport, MutationOutcome, PendingLoad};
pub use error::{StoreError, SyncError};
pub use model::{CollectionKind, MovieId, Session, UserId};
pub use session::{SessionBinder, SessionSignal, WatchSessionSignal};
pub use state::{CollectionSnapshot, CollectionState, LoadState, LoadStatus, OrderedIds, ReviewMap};
pub use store::{
    CollectionStore, InMemoryCollectionStore, RestCollectionStore, StorePath, DEFAULT_NAMESPACE,
};
