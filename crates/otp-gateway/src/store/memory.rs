//! In-process ephemeral store with TTL expiration.

use super::EphemeralStore;
use crate::error::GatewayResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Entry with expiration tracking.
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory store for single-instance deployments and tests.
///
/// Expired entries are invisible immediately and physically removed by a
/// background sweep.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new store and spawn its sweep task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_sweep_interval(Duration::from_secs(60))
    }

    /// Create a new store with a custom sweep interval. Needs a Tokio runtime.
    pub fn with_sweep_interval(interval: Duration) -> Self {
        let store = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        };

        let weak = Arc::downgrade(&store.entries);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(entries) = weak.upgrade() else {
                    break;
                };
                sweep(&entries).await;
            }
        });

        info!("In-memory ephemeral store initialized (sweep every {:?})", interval);
        store
    }

    /// Number of entries currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remaining lifetime of a live entry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }
}

/// Same as [`MemoryStore::new`], and likewise needs a Tokio runtime.
impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn sweep(entries: &RwLock<HashMap<String, Entry>>) {
    let now = Instant::now();
    let mut entries = entries.write().await;
    let before = entries.len();

    entries.retain(|_, entry| entry.is_live(now));

    let removed = before - entries.len();
    if removed > 0 {
        debug!("Swept {} expired entries", removed);
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> GatewayResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> GatewayResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn take(&self, key: &str) -> GatewayResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
