//! Per-product mutual exclusion.
//!
//! Ingestion and registration both read a product, change it and write it
//! back. Two of those running against the same product at the same time
//! would each see the stale record and one write would silently drop the
//! other's change (a lost observation or a duplicate email). Every such
//! read-modify-write holds the lock for its product url from the first read
//! to the final write.
//!
//! Different products never contend. This is an in-process guard; several
//! processes sharing one database need a store-level primitive instead.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries not held by anyone are dropped once the table grows past this.
const PRUNE_THRESHOLD: usize = 1_024;

#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one read-modify-write.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut map = self.inner.lock();

            if map.len() >= PRUNE_THRESHOLD {
                // Only the table itself references an idle entry.
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }

            map.entry(key.to_string()).or_default().clone()
        };

        KeyGuard {
            _guard: slot.lock_owned().await,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
