//! Per-episode mutual exclusion.
//!
//! Every mutation of an episode runs read, apply and commit under that episode's lock, so two
//! transitions on the same episode never interleave. Concurrent supervisor reviews commit one
//! after the other (last committed wins), and a resident approval racing a closure observes the
//! closure either fully before or fully after it.
//!
//! Locks are process-local. An entry exists only while some caller holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Registry of per-episode locks, shared by every service instance in a process.
#[derive(Debug, Default)]
pub struct AttentionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AttentionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: Uuid) -> Arc<Mutex<()>> {
        // The guarded data is `()`, so a panic while holding a lock leaves nothing inconsistent.
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(id).or_default())
    }

    /// Runs `f` while holding the lock for episode `id`.
    pub fn with_lock<T>(&self, id: Uuid, f: impl FnOnce() -> T) -> T {
        let entry = self.entry(id);
        let result = {
            let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(entry);
        self.release(id);
        result
    }

    // Clones are only handed out under the map lock, so a count of one means nobody else
    // holds or waits for this entry.
    fn release(&self, id: Uuid) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&id).is_some_and(|e| Arc::strong_count(e) == 1) {
            map.remove(&id);
        }
    }

    /// Number of episodes currently locked or waited on.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
