/// In-memory collection state observed by presentational components
///
/// Holds the session-scoped snapshot and fans out changes through a
/// `tokio::sync::watch` channel. All policy lives in the engine.
use crate::model::{CollectionKind, MovieId, UserId};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Review text keyed by movie
pub type ReviewMap = BTreeMap<MovieId, String>;

/// Insertion-ordered set of movie ids
///
/// Never holds the same id twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderedIds(Vec<MovieId>);

impl OrderedIds {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, id: &MovieId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovieId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[MovieId] {
        &self.0
    }

    /// Copy with `id` appended, or `None` if it is already present
    pub fn with(&self, id: &MovieId) -> Option<Self> {
        if self.contains(id) {
            return None;
        }
        let mut next = self.0.clone();
        next.push(id.clone());
        Some(Self(next))
    }

    /// Copy with `id` removed, or `None` if it was absent
    pub fn without(&self, id: &MovieId) -> Option<Self> {
        if !self.contains(id) {
            return None;
        }
        Some(Self(self.0.iter().filter(|m| *m != id).cloned().collect()))
    }
}

impl FromIterator<MovieId> for OrderedIds {
    /// Keeps the first occurrence of each id
    fn from_iter<I: IntoIterator<Item = MovieId>>(iter: I) -> Self {
        let mut ids = Vec::new();
        for id in iter {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self(ids)
    }
}

/// Load progress of a single collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoadState {
    /// No session, nothing to load
    #[default]
    Idle,
    Loading,
    Loaded,
    /// The last read failed; the collection is empty
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoadStatus {
    pub favorites: LoadState,
    pub must_watch: LoadState,
    pub reviews: LoadState,
}

impl LoadStatus {
    /// Every collection in the same state
    pub fn all(state: LoadState) -> Self {
        Self {
            favorites: state,
            must_watch: state,
            reviews: state,
        }
    }

    pub fn get(&self, kind: CollectionKind) -> LoadState {
        match kind {
            CollectionKind::Favorites => self.favorites,
            CollectionKind::MustWatch => self.must_watch,
            CollectionKind::Reviews => self.reviews,
        }
    }

    pub fn set(&mut self, kind: CollectionKind, state: LoadState) {
        match kind {
            CollectionKind::Favorites => self.favorites = state,
            CollectionKind::MustWatch => self.must_watch = state,
            CollectionKind::Reviews => self.reviews = state,
        }
    }

    pub fn is_loading(&self) -> bool {
        CollectionKind::ALL
            .iter()
            .any(|kind| self.get(*kind) == LoadState::Loading)
    }

    pub fn failed(&self) -> Vec<CollectionKind> {
        CollectionKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind) == LoadState::Failed)
            .collect()
    }
}

/// Read-only view of one session's collections
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    /// Owner of the collections, `None` while anonymous
    pub user_id: Option<UserId>,
    pub favorites: OrderedIds,
    pub must_watch: OrderedIds,
    pub reviews: ReviewMap,
    pub status: LoadStatus,
}

impl CollectionSnapshot {
    pub(crate) fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            status: LoadStatus::all(LoadState::Loading),
            ..Self::default()
        }
    }

    pub fn contains_favorite(&self, id: &MovieId) -> bool {
        self.favorites.contains(&id.canonical())
    }

    pub fn contains_must_watch(&self, id: &MovieId) -> bool {
        self.must_watch.contains(&id.canonical())
    }

    pub fn review_for(&self, id: &MovieId) -> Option<&str> {
        self.reviews.get(&id.canonical()).map(String::as_str)
    }

    /// True when all three collections are empty
    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty() && self.must_watch.is_empty() && self.reviews.is_empty()
    }

    pub(crate) fn ids(&self, kind: CollectionKind) -> Option<&OrderedIds> {
        match kind {
            CollectionKind::Favorites => Some(&self.favorites),
            CollectionKind::MustWatch => Some(&self.must_watch),
            CollectionKind::Reviews => None,
        }
    }

    pub(crate) fn ids_mut(&mut self, kind: CollectionKind) -> Option<&mut OrderedIds> {
        match kind {
            CollectionKind::Favorites => Some(&mut self.favorites),
            CollectionKind::MustWatch => Some(&mut self.must_watch),
            CollectionKind::Reviews => None,
        }
    }
}

/// Owner of the current snapshot
///
/// Only the sync engine writes; everyone else reads snapshots or subscribes.
pub struct CollectionState {
    tx: watch::Sender<CollectionSnapshot>,
}

impl CollectionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CollectionSnapshot::default());
        Self { tx }
    }

    /// Clone of the current snapshot
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that is woken on every change; dropping it unsubscribes
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.tx.subscribe()
    }

    /// Read from the current snapshot without cloning it
    pub(crate) fn read<T>(&self, f: impl FnOnce(&CollectionSnapshot) -> T) -> T {
        f(&self.tx.borrow())
    }

    /// Replace the whole snapshot
    pub(crate) fn replace(&self, snapshot: CollectionSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut CollectionSnapshot)) {
        self.tx.send_modify(f);
    }
}

impl Default for CollectionState {
    fn default() -> Self {
        Self::new()
    }
}
