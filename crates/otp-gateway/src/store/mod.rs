//! Ephemeral key-value storage with per-key expiry.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::GatewayResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value store whose entries expire on their own.
///
/// Implementations must be safe for concurrent use. `take` must be a single
/// atomic fetch-and-delete: two concurrent callers can never both observe
/// the same value.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value, for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> GatewayResult<()>;

    /// Read a live value.
    async fn get(&self, key: &str) -> GatewayResult<Option<String>>;

    /// Remove a value. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> GatewayResult<bool>;

    /// Atomically read and remove a live value.
    async fn take(&self, key: &str) -> GatewayResult<Option<String>>;

    /// Check backend connectivity.
    async fn health_check(&self) -> bool;
}
