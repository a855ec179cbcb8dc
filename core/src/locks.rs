use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Per-key async mutexes. Holding the guard for a key serialises every other
/// caller asking for the same key inside this process.
///
/// Entries live only while someone holds or waits on the key; the last guard
/// to drop removes it.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

/// Guard returned by [`KeyedLocks`]. The key stays locked until it is dropped.
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockMap>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or awaits the key.
        // Runs under the shard lock, so a concurrent `lock` either cloned the
        // mutex already or will insert a fresh one.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: impl Into<String>) -> KeyGuard {
        let key = key.into();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        KeyGuard {
            guard: Some(mutex.lock_owned().await),
            key,
            locks: self.locks.clone(),
        }
    }

    pub async fn lock_workspace(&self, workspace_id: &str) -> KeyGuard {
        self.lock(format!("ws:{workspace_id}")).await
    }

    pub async fn lock_doc(&self, workspace_id: &str, doc_id: &str) -> KeyGuard {
        self.lock(format!("doc:{workspace_id}:{doc_id}")).await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
