//! Shared test doubles for the sync engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use movie_shelf_sync::{
    CollectionStore, CollectionSync, InMemoryCollectionStore, StoreError, StorePath,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    Write,
}

/// Holds every call on one (op, path) until the test releases it
pub struct Gate {
    arrived: Semaphore,
    release: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            arrived: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }

    /// Wait until a call has reached the gate
    pub async fn arrived(&self) {
        self.arrived.acquire().await.unwrap().forget();
    }

    /// Let one held call through
    pub fn release(&self) {
        self.release.add_permits(1);
    }
}

/// In-memory store whose calls can be held in flight or made to fail
pub struct GatedStore {
    pub inner: InMemoryCollectionStore,
    gates: Mutex<HashMap<(Op, String), Arc<Gate>>>,
    failures: Mutex<HashMap<(Op, String), usize>>,
}

impl GatedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryCollectionStore::new(),
            gates: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        })
    }

    pub fn hold(&self, op: Op, path: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.gates
            .lock()
            .insert((op, path.to_string()), Arc::clone(&gate));
        gate
    }

    /// Fail the next `times` calls on (op, path) after they pass any gate
    pub fn fail(&self, op: Op, path: &str, times: usize) {
        self.failures.lock().insert((op, path.to_string()), times);
    }

    pub fn seed(&self, path: &str, value: Value) {
        self.inner.seed(&StorePath::new(path), value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.inner.get(&StorePath::new(path))
    }

    pub fn writes_to(&self, path: &str) -> Vec<Value> {
        self.inner.writes_to(&StorePath::new(path))
    }

    async fn pass(&self, op: Op, path: &StorePath) -> Result<(), StoreError> {
        let key = (op, path.to_string());
        let gate = self.gates.lock().get(&key).cloned();
        if let Some(gate) = gate {
            gate.arrived.add_permits(1);
            gate.release.acquire().await.unwrap().forget();
        }

        let mut failures = self.failures.lock();
        if let Some(remaining) = failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!("injected failure at {}", path)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for GatedStore {
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.pass(Op::Read, path).await?;
        self.inner.read(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.pass(Op::Write, path).await?;
        self.inner.write(path, value).await
    }
}

pub fn engine() -> (Arc<GatedStore>, CollectionSync) {
    let store = GatedStore::new();
    let sync = CollectionSync::new(store.clone());
    (store, sync)
}
