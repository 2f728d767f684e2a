//! Short-lived memoization of slow meter computations.
//!
//! Entries expire a fixed time after they were stored. Expiry is checked lazily:
//! a lookup that finds a stale entry removes it and reports a miss. There is no
//! size cap, so the key space is expected to stay small.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct ResultCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key` if it is younger than the TTL. A stale entry is evicted.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;

        let fresh = match entries.get(key) {
            Some(entry) => entry.created_at.elapsed() < self.ttl,
            None => return None,
        };
        if fresh {
            return entries.get(key).map(|entry| entry.value.clone());
        }

        tracing::debug!(key, "Evicting stale cache entry");
        entries.remove(key);
        None
    }

    /// Store `value` under `key`, replacing any previous entry and restarting its TTL.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
        };
        self.entries.lock().await.insert(key.into(), entry);
    }

    /// Number of stored entries, stale or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
