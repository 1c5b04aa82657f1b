//! In-memory persistence with fault injection.

use super::{Persistence, PersistenceError, Preferences, Transform};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory persistence backend.
///
/// Clones share the same underlying data, so a test can keep a handle for
/// inspection and fault injection after handing one to the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    stored: Preferences,
    read_faults: BTreeMap<String, PersistenceError>,
    fail_next_load: Option<PersistenceError>,
    fail_next_update: Option<PersistenceError>,
    update_count: usize,
}

impl MemoryInner {
    fn observed(&self) -> Preferences {
        let mut prefs = self.stored.clone();
        for (key, err) in &self.read_faults {
            prefs.mark_unreadable(key, err.clone());
        }
        prefs
    }
}

impl MemoryPersistence {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `prefs`.
    pub fn with_preferences(prefs: Preferences) -> Self {
        let backend = Self::default();
        backend.lock().stored = prefs;
        backend
    }

    /// Make every read of `key` fail with `error` until cleared.
    pub fn inject_read_fault(&self, key: &str, error: PersistenceError) {
        self.lock().read_faults.insert(key.to_string(), error);
    }

    /// Remove all injected read faults.
    pub fn clear_read_faults(&self) {
        self.lock().read_faults.clear();
    }

    /// Cause the next `load()` to fail as a whole.
    pub fn fail_next_load(&self, error: PersistenceError) {
        self.lock().fail_next_load = Some(error);
    }

    /// Cause the next `update()` to fail without writing.
    pub fn fail_next_update(&self, error: PersistenceError) {
        self.lock().fail_next_update = Some(error);
    }

    /// What is actually stored, ignoring injected faults.
    pub fn stored(&self) -> Preferences {
        self.lock().stored.clone()
    }

    /// Number of committed updates.
    pub fn update_count(&self) -> usize {
        self.lock().update_count
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self) -> Result<Preferences, PersistenceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fail_next_load.take() {
            return Err(err);
        }
        Ok(inner.observed())
    }

    async fn update(&self, transform: Transform) -> Result<Preferences, PersistenceError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fail_next_update.take() {
            return Err(err);
        }
        let mut next = inner.stored.clone();
        transform(&mut next);
        inner.stored = next;
        inner.update_count += 1;
        Ok(inner.observed())
    }
}
