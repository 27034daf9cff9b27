//! Persistent storage seam.
//!
//! Everything durable goes through [`KeyValueStore`]: an arbitrary
//! string-keyed store with async get/set/remove and no transactions.
//! The crate ships [`MemoryStore`] for tests and ephemeral use and
//! [`FileStore`](file::FileStore) for on-disk persistence; hosts may
//! supply their own backend.

mod file;
mod instance_store;

pub use file::FileStore;
pub use instance_store::{DayMap, ExtraPracticeMinutes, InstanceStore, RETENTION_DAYS};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;

/// Storage keys for the persisted records.
pub mod keys {
    pub const USER_SCHEDULE: &str = "user_schedule";
    pub const APP_SETTINGS: &str = "app_settings";
    pub const DAILY_INSTANCES: &str = "daily_instances";
    pub const EVENT_LOG: &str = "event_log";
    pub const EXTRA_PRACTICE_MINUTES: &str = "extra_practice_minutes";
}

/// Durable, asynchronous string-keyed storage.
///
/// Implementations must tolerate concurrent calls; callers that need
/// read-modify-write atomicity serialize themselves (see
/// [`InstanceStore`]).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value for `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and ephemeral usage. Cheaply cloneable;
/// clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the raw value for `key`, for assertions in tests.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
