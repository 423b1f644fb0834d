/// In-process document store
///
/// Keeps one JSON tree. Writing `users/1/reviews/7` creates the intermediate
/// objects, reading `users/1/reviews` returns the subtree, and writing `null`
/// deletes. Every write is recorded so callers can inspect what was persisted.
use super::{CollectionStore, StorePath};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A write accepted by the store
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub path: StorePath,
    pub value: Value,
}

pub struct InMemoryCollectionStore {
    root: RwLock<Value>,
    writes: Mutex<Vec<WriteRecord>>,
    offline: AtomicBool,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Null),
            writes: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Store a value without recording it as a write
    pub fn seed(&self, path: &StorePath, value: Value) {
        let segments: Vec<&str> = path.segments().collect();
        put(&mut self.root.write(), &segments, value);
    }

    /// Current value at `path`
    pub fn get(&self, path: &StorePath) -> Option<Value> {
        lookup(&self.root.read(), path).cloned()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// All accepted writes, oldest first
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    /// Values written to exactly `path`, oldest first
    pub fn writes_to(&self, path: &StorePath) -> Vec<Value> {
        self.writes
            .lock()
            .iter()
            .filter(|record| &record.path == path)
            .map(|record| record.value.clone())
            .collect()
    }

    /// Number of writes whose path starts with `prefix`
    pub fn write_count_under(&self, prefix: &str) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|record| record.path.as_str().starts_with(prefix))
            .count()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.check_online()?;
        Ok(self.get(path))
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.check_online()?;
        debug!(path = %path, "In-memory store write");

        let segments: Vec<&str> = path.segments().collect();
        put(&mut self.root.write(), &segments, value.clone());
        self.writes.lock().push(WriteRecord {
            path: path.clone(),
            value,
        });
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if is_vacant(node) {
        None
    } else {
        Some(node)
    }
}

fn put(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    let mut map = match node.take() {
        Value::Object(map) => map,
        // arrays addressed by key become index-keyed objects
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Map::new(),
    };

    let child = map.entry(head.to_string()).or_insert(Value::Null);
    put(child, rest, value);
    if is_vacant(child) {
        map.remove(*head);
    }

    *node = Value::Object(map);
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
