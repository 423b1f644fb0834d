//! Collection synchronization engine
//!
//! Loads a user's favorites, must-watch list and reviews when a session
//! starts, clears them when it ends, and applies mutations so that the remote
//! store is written before the in-memory snapshot changes.
//!
//! Ordering rules:
//!
//! - Every session transition bumps a generation counter. Work issued under an
//!   older generation is discarded when it resolves.
//! - Each collection has a lane. A lane stays closed until the collection's
//!   load settles, then serializes writers: set mutations and loads hold it
//!   exclusively, review upserts share it and serialize per movie.
//! - Lanes belong to one session, so a hung call from a previous session never
//!   blocks the next one.

use crate::codec::{self, CollectionValue};
use crate::error::{StoreError, SyncError};
use crate::model::{CollectionKind, MovieId, Session, UserId};
use crate::state::{CollectionSnapshot, CollectionState, LoadState, OrderedIds};
use crate::store::{CollectionStore, RestCollectionStore, StorePath, DEFAULT_NAMESPACE};
use dashmap::DashMap;
use futures_util::future::join_all;
use movie_shelf_core::config::StoreConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{debug, error, info, warn};

/// Result of a mutation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Persisted remotely and now visible in the snapshot
    Applied,
    /// Requested state already held; nothing was written
    Unchanged,
    /// No authenticated session; nothing was written
    SessionRequired,
    /// The session changed before the result could be applied
    Superseded,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// Summary of one load pass for a session
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub user_id: UserId,
    pub generation: u64,
    pub loaded: Vec<CollectionKind>,
    pub failures: Vec<SyncError>,
    /// Collections whose result arrived after the session moved on
    pub superseded: Vec<CollectionKind>,
}

impl LoadReport {
    fn new(user_id: UserId, generation: u64) -> Self {
        Self {
            user_id,
            generation,
            loaded: Vec::new(),
            failures: Vec::new(),
            superseded: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.superseded.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum LoadOutcome {
    Loaded,
    Failed(SyncError),
    Superseded,
}

#[derive(Debug, Clone, Copy)]
enum SetEdit {
    Insert,
    Remove,
}

impl SetEdit {
    fn apply(self, ids: &OrderedIds, movie_id: &MovieId) -> Option<OrderedIds> {
        match self {
            SetEdit::Insert => ids.with(movie_id),
            SetEdit::Remove => ids.without(movie_id),
        }
    }
}

/// Per-collection gate and writer lock
struct Lane {
    ready: watch::Sender<LoadState>,
    lock: AsyncRwLock<()>,
}

impl Lane {
    fn loading() -> Self {
        let (ready, _) = watch::channel(LoadState::Loading);
        Self {
            ready,
            lock: AsyncRwLock::new(()),
        }
    }

    /// Wait until no load is pending and return how the last one ended
    async fn settled(&self) -> LoadState {
        let mut rx = self.ready.subscribe();
        rx.wait_for(|state| *state != LoadState::Loading)
            .await
            .map(|state| *state)
            .unwrap_or(LoadState::Idle)
    }

    fn settle(&self, state: LoadState) {
        self.ready.send_replace(state);
    }

    /// Reopen a failed lane for loading; false if it was not failed
    fn begin_reload(&self) -> bool {
        self.ready.send_if_modified(|state| {
            if *state == LoadState::Failed {
                *state = LoadState::Loading;
                true
            } else {
                false
            }
        })
    }
}

/// Everything that lives exactly as long as one authenticated session
struct SessionScope {
    generation: u64,
    user_id: UserId,
    favorites: Lane,
    must_watch: Lane,
    reviews: Lane,
    /// Keyed by store path segment, so ids sharing a document share a lock
    review_keys: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SessionScope {
    fn new(generation: u64, user_id: UserId) -> Self {
        Self {
            generation,
            user_id,
            favorites: Lane::loading(),
            must_watch: Lane::loading(),
            reviews: Lane::loading(),
            review_keys: DashMap::new(),
        }
    }

    fn lane(&self, kind: CollectionKind) -> &Lane {
        match kind {
            CollectionKind::Favorites => &self.favorites,
            CollectionKind::MustWatch => &self.must_watch,
            CollectionKind::Reviews => &self.reviews,
        }
    }

    fn review_key_lock(&self, movie_id: &MovieId) -> Arc<AsyncMutex<()>> {
        self.review_keys
            .entry(movie_id.key())
            .or_default()
            .value()
            .clone()
    }
}

struct Epoch {
    generation: u64,
    session: Session,
    scope: Option<Arc<SessionScope>>,
}

/// Load pass created by a session transition or a reload
///
/// The transition itself already happened when this value was created;
/// `run` only performs the reads.
pub struct PendingLoad {
    sync: CollectionSync,
    scope: Arc<SessionScope>,
    kinds: Vec<CollectionKind>,
}

impl PendingLoad {
    pub fn user_id(&self) -> &UserId {
        &self.scope.user_id
    }

    pub fn generation(&self) -> u64 {
        self.scope.generation
    }

    pub fn collections(&self) -> &[CollectionKind] {
        &self.kinds
    }

    /// Read every pending collection concurrently, applying each as it resolves
    pub async fn run(self) -> LoadReport {
        let loads = self
            .kinds
            .iter()
            .map(|kind| self.sync.load_collection(&self.scope, *kind));
        let outcomes = join_all(loads).await;

        let mut report = LoadReport::new(self.scope.user_id.clone(), self.scope.generation);
        for (kind, outcome) in self.kinds.iter().zip(outcomes) {
            match outcome {
                LoadOutcome::Loaded => report.loaded.push(*kind),
                LoadOutcome::Failed(err) => report.failures.push(err),
                LoadOutcome::Superseded => report.superseded.push(*kind),
            }
        }

        info!(
            user_id = %report.user_id,
            generation = report.generation,
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            superseded = report.superseded.len(),
            "Collection load finished"
        );
        report
    }
}

impl Drop for PendingLoad {
    /// A load dropped before it settled leaves its collections failed, so
    /// writers are released and a reload can pick them up.
    fn drop(&mut self) {
        for kind in &self.kinds {
            let abandoned = self.scope.lane(*kind).ready.send_if_modified(|state| {
                if *state == LoadState::Loading {
                    *state = LoadState::Failed;
                    true
                } else {
                    false
                }
            });
            if abandoned {
                self.sync.apply_if_current(&self.scope, |snapshot| {
                    snapshot.status.set(*kind, LoadState::Failed);
                });
                warn!(user_id = %self.scope.user_id, collection = %kind, "Load abandoned before completion");
            }
        }
    }
}

/// Synchronization engine for one client
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct CollectionSync {
    store: Arc<dyn CollectionStore>,
    state: Arc<CollectionState>,
    epoch: Arc<Mutex<Epoch>>,
    namespace: Arc<str>,
}

impl CollectionSync {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self {
            store,
            state: Arc::new(CollectionState::new()),
            epoch: Arc::new(Mutex::new(Epoch {
                generation: 0,
                session: Session::Anonymous,
                scope: None,
            })),
            namespace: Arc::from(DEFAULT_NAMESPACE),
        }
    }

    /// Engine backed by the REST store described by `config`
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = RestCollectionStore::from_config(config)?;
        Ok(Self::new(Arc::new(store)).with_namespace(&config.root))
    }

    /// Use a namespace root other than `users`
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Arc::from(namespace);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.state.subscribe()
    }

    /// Session the engine is currently bound to
    pub fn session(&self) -> Session {
        self.epoch.lock().session.clone()
    }

    /// Apply a session transition immediately
    ///
    /// Signing out clears all collections before this returns. Signing in as
    /// a different user clears them and returns the load to run. The same
    /// session delivered twice is ignored. A user id that is not a single
    /// store path segment counts as signed out.
    pub fn begin_session(&self, session: Session) -> Option<PendingLoad> {
        let session = match session {
            Session::Authenticated(user_id) if !user_id.is_well_formed() => {
                warn!(user_id = ?user_id.as_str(), "Rejected malformed user id; treating as signed out");
                Session::Anonymous
            }
            session => session,
        };

        let mut epoch = self.epoch.lock();
        if epoch.session == session {
            debug!(session = ?session, "Session re-delivered; nothing to do");
            return None;
        }

        epoch.generation += 1;
        let generation = epoch.generation;
        epoch.session = session.clone();

        if let Some(previous) = epoch.scope.take() {
            info!(
                user_id = %previous.user_id,
                generation = previous.generation,
                "Session ended; in-flight work will be discarded"
            );
        }

        match session {
            Session::Anonymous => {
                self.state.replace(CollectionSnapshot::default());
                info!(generation, "Signed out; collections cleared");
                None
            }
            Session::Authenticated(user_id) => {
                let scope = Arc::new(SessionScope::new(generation, user_id.clone()));
                epoch.scope = Some(Arc::clone(&scope));
                self.state
                    .replace(CollectionSnapshot::for_user(user_id.clone()));
                info!(user_id = %user_id, generation, "Session started; loading collections");

                Some(PendingLoad {
                    sync: self.clone(),
                    scope,
                    kinds: CollectionKind::ALL.to_vec(),
                })
            }
        }
    }

    /// Apply a session transition and wait for its load, if any
    pub async fn on_session_change(&self, session: Session) -> Option<LoadReport> {
        match self.begin_session(session) {
            Some(load) => Some(load.run().await),
            None => None,
        }
    }

    /// Re-read the collections whose last load failed
    pub fn begin_reload(&self) -> Option<PendingLoad> {
        let epoch = self.epoch.lock();
        let scope = epoch.scope.clone()?;

        let kinds: Vec<CollectionKind> = CollectionKind::ALL
            .into_iter()
            .filter(|kind| scope.lane(*kind).begin_reload())
            .collect();
        if kinds.is_empty() {
            return None;
        }

        self.state.update(|snapshot| {
            for kind in &kinds {
                snapshot.status.set(*kind, LoadState::Loading);
            }
        });
        info!(user_id = %scope.user_id, collections = ?kinds, "Reloading failed collections");

        Some(PendingLoad {
            sync: self.clone(),
            scope,
            kinds,
        })
    }

    pub async fn reload_failed(&self) -> Option<LoadReport> {
        match self.begin_reload() {
            Some(load) => Some(load.run().await),
            None => None,
        }
    }

    pub async fn add_to_favorites(&self, movie_id: &MovieId) -> Result<MutationOutcome, SyncError> {
        self.mutate_ids(CollectionKind::Favorites, movie_id, SetEdit::Insert)
            .await
    }

    pub async fn remove_from_favorites(
        &self,
        movie_id: &MovieId,
    ) -> Result<MutationOutcome, SyncError> {
        self.mutate_ids(CollectionKind::Favorites, movie_id, SetEdit::Remove)
            .await
    }

    pub async fn add_to_must_watch(&self, movie_id: &MovieId) -> Result<MutationOutcome, SyncError> {
        self.mutate_ids(CollectionKind::MustWatch, movie_id, SetEdit::Insert)
            .await
    }

    pub async fn remove_from_must_watch(
        &self,
        movie_id: &MovieId,
    ) -> Result<MutationOutcome, SyncError> {
        self.mutate_ids(CollectionKind::MustWatch, movie_id, SetEdit::Remove)
            .await
    }

    /// Write one review at its own path and then show it
    pub async fn upsert_review(
        &self,
        movie_id: &MovieId,
        review: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let movie_id = &movie_id.canonical();
        let Some(scope) = self.current_scope() else {
            debug!(movie_id = %movie_id, "No session; review not saved");
            return Ok(MutationOutcome::SessionRequired);
        };

        let lane = scope.lane(CollectionKind::Reviews);
        lane.settled().await;
        let _shared = lane.lock.read().await;
        let key_lock = scope.review_key_lock(movie_id);
        let _key_guard = key_lock.lock().await;

        if !self.is_current(&scope) {
            return Ok(self.superseded(&scope, CollectionKind::Reviews));
        }

        let path = StorePath::review(&self.namespace, &scope.user_id, movie_id);
        if let Err(source) = self.store.write(&path, codec::encode_review(review)).await {
            error!(path = %path, error = %source, "Failed to persist review");
            return Err(SyncError::RemoteWriteFailed {
                path: path.to_string(),
                source,
            });
        }

        let applied = self.apply_if_current(&scope, |snapshot| {
            snapshot.reviews.insert(movie_id.clone(), review.to_string());
        });
        if applied {
            debug!(user_id = %scope.user_id, movie_id = %movie_id, "Review saved");
            Ok(MutationOutcome::Applied)
        } else {
            Ok(self.superseded(&scope, CollectionKind::Reviews))
        }
    }

    async fn mutate_ids(
        &self,
        kind: CollectionKind,
        movie_id: &MovieId,
        edit: SetEdit,
    ) -> Result<MutationOutcome, SyncError> {
        let movie_id = &movie_id.canonical();
        let Some(scope) = self.current_scope() else {
            debug!(collection = %kind, movie_id = %movie_id, "No session; mutation skipped");
            return Ok(MutationOutcome::SessionRequired);
        };

        let lane = scope.lane(kind);
        if lane.settled().await == LoadState::Failed && self.is_current(&scope) {
            return Err(SyncError::CollectionUnavailable { collection: kind });
        }
        let _exclusive = lane.lock.write().await;

        let proposed = self.read_if_current(&scope, |snapshot| {
            snapshot.ids(kind).and_then(|ids| edit.apply(ids, movie_id))
        });
        let next = match proposed {
            None => return Ok(self.superseded(&scope, kind)),
            Some(None) => {
                debug!(collection = %kind, movie_id = %movie_id, edit = ?edit, "Already satisfied");
                return Ok(MutationOutcome::Unchanged);
            }
            Some(Some(next)) => next,
        };

        let path = StorePath::collection(&self.namespace, &scope.user_id, kind);
        if let Err(source) = self.store.write(&path, codec::encode_ids(&next)).await {
            error!(path = %path, error = %source, "Failed to persist collection");
            return Err(SyncError::RemoteWriteFailed {
                path: path.to_string(),
                source,
            });
        }

        let size = next.len();
        let applied = self.apply_if_current(&scope, |snapshot| {
            if let Some(ids) = snapshot.ids_mut(kind) {
                *ids = next;
            }
        });
        if applied {
            debug!(
                user_id = %scope.user_id,
                collection = %kind,
                movie_id = %movie_id,
                edit = ?edit,
                size,
                "Collection updated"
            );
            Ok(MutationOutcome::Applied)
        } else {
            Ok(self.superseded(&scope, kind))
        }
    }

    async fn load_collection(&self, scope: &SessionScope, kind: CollectionKind) -> LoadOutcome {
        let lane = scope.lane(kind);
        let _exclusive = lane.lock.write().await;

        let path = StorePath::collection(&self.namespace, &scope.user_id, kind);
        let result = match self.store.read(&path).await {
            Ok(value) => codec::decode_collection(kind, &path, value),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                let applied = self.apply_if_current(scope, |snapshot| {
                    match value {
                        CollectionValue::Ids(loaded) => {
                            if let Some(ids) = snapshot.ids_mut(kind) {
                                *ids = loaded;
                            }
                        }
                        CollectionValue::Reviews(reviews) => snapshot.reviews = reviews,
                    }
                    snapshot.status.set(kind, LoadState::Loaded);
                });

                if applied {
                    lane.settle(LoadState::Loaded);
                    debug!(user_id = %scope.user_id, collection = %kind, "Collection loaded");
                    LoadOutcome::Loaded
                } else {
                    lane.settle(LoadState::Idle);
                    warn!(
                        user_id = %scope.user_id,
                        collection = %kind,
                        generation = scope.generation,
                        "Load result discarded: session changed"
                    );
                    LoadOutcome::Superseded
                }
            }
            Err(source) => {
                let applied = self.apply_if_current(scope, |snapshot| {
                    match kind {
                        CollectionKind::Reviews => snapshot.reviews.clear(),
                        _ => {
                            if let Some(ids) = snapshot.ids_mut(kind) {
                                *ids = OrderedIds::new();
                            }
                        }
                    }
                    snapshot.status.set(kind, LoadState::Failed);
                });
                lane.settle(LoadState::Failed);

                if applied {
                    error!(
                        user_id = %scope.user_id,
                        collection = %kind,
                        error = %source,
                        "Failed to load collection"
                    );
                    LoadOutcome::Failed(SyncError::RemoteReadFailed {
                        user_id: scope.user_id.clone(),
                        collection: kind,
                        source,
                    })
                } else {
                    warn!(
                        user_id = %scope.user_id,
                        collection = %kind,
                        "Load failure ignored: session changed"
                    );
                    LoadOutcome::Superseded
                }
            }
        }
    }

    fn current_scope(&self) -> Option<Arc<SessionScope>> {
        self.epoch.lock().scope.clone()
    }

    fn is_current(&self, scope: &SessionScope) -> bool {
        self.epoch.lock().generation == scope.generation
    }

    /// Read the snapshot only if `scope` is still the active session
    fn read_if_current<T>(
        &self,
        scope: &SessionScope,
        f: impl FnOnce(&CollectionSnapshot) -> T,
    ) -> Option<T> {
        let epoch = self.epoch.lock();
        if epoch.generation != scope.generation {
            return None;
        }
        Some(self.state.read(f))
    }

    /// Update the snapshot only if `scope` is still the active session
    fn apply_if_current(
        &self,
        scope: &SessionScope,
        f: impl FnOnce(&mut CollectionSnapshot),
    ) -> bool {
        let epoch = self.epoch.lock();
        if epoch.generation != scope.generation {
            return false;
        }
        self.state.update(f);
        true
    }

    fn superseded(&self, scope: &SessionScope, kind: CollectionKind) -> MutationOutcome {
        warn!(
            user_id = %scope.user_id,
            collection = %kind,
            generation = scope.generation,
            "Mutation result discarded: session changed"
        );
        MutationOutcome::Superseded
    }
}
