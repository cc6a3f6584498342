use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::kind::FolderPrefix;

/// In-process locks keyed by record folder.
///
/// Serializes reconciliation runs for the same record inside one process.
/// Entries are dropped once nobody holds or waits on them.
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held while a record folder is being reconciled.
pub struct RecordGuard<'a> {
    locks: &'a RecordLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the folder is free and take it.
    pub async fn acquire(&self, prefix: &FolderPrefix) -> RecordGuard<'_> {
        let key = prefix.as_str().to_string();
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        debug!("Acquired record lock for {}", key);

        RecordGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of folders currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
