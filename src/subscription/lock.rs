//! Per-subscription mutual exclusion.
//!
//! The poll scheduler and the add/remove actions take the same lock for a
//! title, so a poll never observes a half-applied add or remove and two
//! polls of one subscription never overlap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async locks, one per subscription title.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SubscriptionLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `title`.
    ///
    /// Access is held until the returned guard is dropped.
    pub async fn lock(&self, title: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(table.entry(title.to_string()).or_default())
        };
        mutex.lock_owned().await
    }

    /// Drop the lock entry for `title` if nobody holds or awaits it.
    ///
    /// Call after the guard for a removed subscription has been released.
    pub fn forget(&self, title: &str) {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mutex) = table.get(title) {
            if Arc::strong_count(mutex) == 1 {
                table.remove(title);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
