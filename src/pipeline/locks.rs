use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per task identifier. Runs for the same identifier share a
/// staging directory and a remote, so they take turns; different identifiers
/// never contend. Keys are ASCII-lowercased: GitHub repository names are
/// case-insensitive, so `Demo-42` and `demo-42` push to the same remote.
#[derive(Clone, Default)]
pub struct TaskLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `task`. The lock is released when the guard drops.
    pub async fn acquire(&self, task: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only the map still references belong to finished runs
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(task.to_ascii_lowercase()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of identifiers with a run in progress or waiting.
    pub fn tracked(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}
