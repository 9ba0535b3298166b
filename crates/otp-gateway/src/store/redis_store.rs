//! Redis-backed ephemeral store.

use super::EphemeralStore;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Key probed by the health check.
const HEALTH_PROBE_KEY: &str = "otp-gateway:health";

/// Ephemeral store backed by Redis key expiry.
///
/// `take` maps to `GETDEL`, which Redis executes atomically.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis. Every later operation is bounded by `op_timeout`.
    pub async fn connect(url: &str, op_timeout: Duration) -> GatewayResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| GatewayError::Storage("Timed out connecting to Redis".into()))??;

        info!("Connected to Redis ephemeral store");
        Ok(Self { conn, op_timeout })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => {
                warn!(op, "Redis operation timed out");
                Err(GatewayError::Storage(format!("Redis {} timed out", op)))
            }
        }
    }
}

#[async_trait]
impl EphemeralStore for RedisStore {
    #[instrument(skip(self, key, value))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> GatewayResult<()> {
        let mut conn = self.conn.clone();
        // Redis rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        self.bounded("SET", conn.set_ex::<_, _, ()>(key, value, seconds))
            .await
    }

    #[instrument(skip(self, key))]
    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded("GET", conn.get::<_, Option<String>>(key)).await
    }

    #[instrument(skip(self, key))]
    async fn delete(&self, key: &str) -> GatewayResult<bool> {
        let mut conn = self.conn.clone();
        let removed = self.bounded("DEL", conn.del::<_, usize>(key)).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self, key))]
    async fn take(&self, key: &str) -> GatewayResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded("GETDEL", conn.get_del::<_, Option<String>>(key))
            .await
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        self.bounded("EXISTS", conn.exists::<_, bool>(HEALTH_PROBE_KEY))
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::generate_nonce;

    // Integration tests - require a running Redis
    // Run with: REDIS_URL=redis://127.0.0.1/ cargo test -p otp-gateway -- --ignored
    async fn live_store() -> RedisStore {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL not set");
        RedisStore::connect(&url, Duration::from_secs(2)).await.unwrap()
    }

    fn unique_key(label: &str) -> String {
        format!("otp-gateway-test:{}:{}", label, generate_nonce())
    }

    #[tokio::test]
    #[ignore]
    async fn test_take_returns_value_once() {
        let store = live_store().await;
        let key = unique_key("take");

        store.set(&key, "abc", Duration::from_secs(30)).await.unwrap();
        assert_eq!(store.take(&key).await.unwrap(), Some("abc".into()));
        assert_eq!(store.take(&key).await.unwrap(), None);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_take_single_winner() {
        let store = live_store().await;
        let key = unique_key("race");
        store.set(&key, "abc", Duration::from_secs(30)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.take(&key).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_sub_second_ttl_is_clamped() {
        let store = live_store().await;
        let key = unique_key("ttl");

        store.set(&key, "abc", Duration::from_millis(200)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some("abc".into()));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_delete_and_health() {
        let store = live_store().await;
        let key = unique_key("delete");

        store.set(&key, "abc", Duration::from_secs(30)).await.unwrap();
        assert!(store.delete(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
        assert!(store.health_check().await);
    }
}
