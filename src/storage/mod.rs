//! Key-value storage contracts
//!
//! Every store in Gatehouse persists through these two traits so the backing
//! engine can be swapped without touching account or credential logic:
//! - `KeyValueStorage` - get/set/delete by key
//! - `ExpiringStorage` - the same, plus an optional per-entry time-to-live

pub mod memory;

pub use memory::{spawn_cleanup_task, MemoryStorage};

use async_trait::async_trait;
use std::time::Duration;

use crate::types::Result;

/// Basic key-value storage with atomic per-key operations
#[async_trait]
pub trait KeyValueStorage<V>: Send + Sync {
    /// Get the value stored for a key
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Store a value without expiration, replacing any existing entry
    async fn set(&self, key: &str, value: V) -> Result<()>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Key-value storage whose entries can expire
#[async_trait]
pub trait ExpiringStorage<V>: KeyValueStorage<V> {
    /// Store a value that disappears after `ttl` (never when `None`)
    async fn set_expiring(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()>;
}
