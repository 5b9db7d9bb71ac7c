//! In-memory storage with TTL support
//!
//! Entries are dropped lazily on read and periodically by the cleanup task.
//! State lives in this process only.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ExpiringStorage, KeyValueStorage};
use crate::types::Result;

/// Stored value with optional expiry
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Concurrent in-memory key-value store
pub struct MemoryStorage<V> {
    entries: DashMap<String, Entry<V>>,
}

impl<V: Clone + Send + Sync + 'static> MemoryStorage<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn insert(&self, key: &str, value: V, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            // A deadline past the clock's range never arrives
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.entries.insert(key.to_string(), entry);
    }
}

impl<V: Clone + Send + Sync + 'static> Default for MemoryStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> KeyValueStorage<V> for MemoryStorage<V> {
    async fn get(&self, key: &str) -> Result<Option<V>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        // Expired: drop it now rather than waiting for the sweep
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: V) -> Result<()> {
        self.insert(key, value, None);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> ExpiringStorage<V> for MemoryStorage<V> {
    async fn set_expiring(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        self.insert(key, value, ttl);
        Ok(())
    }
}

/// Spawn a background task that sweeps expired entries
pub fn spawn_cleanup_task<V: Clone + Send + Sync + 'static>(
    name: &'static str,
    store: Arc<MemoryStorage<V>>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = store.cleanup();
            if removed > 0 {
                debug!("{} cleanup: removed {} expired entries", name, removed);
            }
        }
    });
    info!("{} cleanup task started (every {:?})", name, interval);
}
