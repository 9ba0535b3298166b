//! Postgres user table.

use super::UserStore;
use crate::error::GatewayResult;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Insert-or-return keyed on the unique phone number column.
///
/// The no-op update makes `RETURNING` yield the existing row on conflict.
const UPSERT_USER: &str = r#"
    INSERT INTO "user" (id, first_name, last_name, phone_number)
    VALUES ($1, '', '', $2)
    ON CONFLICT (phone_number)
    DO UPDATE SET phone_number = EXCLUDED.phone_number
    RETURNING id
"#;

/// User table in Postgres.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        info!("Connected to Postgres user store");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self, candidate_id))]
    async fn upsert(&self, phone: &str, candidate_id: &str) -> GatewayResult<String> {
        let id: String = sqlx::query_scalar(UPSERT_USER)
            .bind(candidate_id)
            .bind(phone)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::candidate_user_id;

    const SCHEMA: &str = include_str!("../../migrations/0001_create_user.sql");

    // Integration tests - require a running Postgres
    // Run with: DATABASE_URL=postgres://... cargo test -p otp-gateway -- --ignored
    async fn live_store() -> PgUserStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let store = PgUserStore::connect(&url, 4, Duration::from_secs(5))
            .await
            .unwrap();
        // Parallel tests can race on CREATE TABLE; the retry sees the table.
        if sqlx::raw_sql(SCHEMA).execute(&store.pool).await.is_err() {
            sqlx::raw_sql(SCHEMA).execute(&store.pool).await.unwrap();
        }
        store
    }

    /// A number no other run has used.
    fn unique_phone() -> String {
        let digits: String = candidate_user_id()
            .bytes()
            .filter(u8::is_ascii_digit)
            .take(9)
            .map(char::from)
            .collect();
        format!("+1555{:0>9}", digits)
    }

    #[tokio::test]
    #[ignore]
    async fn test_upsert_returns_first_id() {
        let store = live_store().await;
        let phone = unique_phone();

        let first = store.upsert(&phone, &candidate_user_id()).await.unwrap();
        let second = store.upsert(&phone, &candidate_user_id()).await.unwrap();

        assert!(first.starts_with("u-"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_first_upserts_agree() {
        let store = live_store().await;
        let phone = unique_phone();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let phone = phone.clone();
                tokio::spawn(async move { store.upsert(&phone, &candidate_user_id()).await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user" WHERE phone_number = $1"#)
                .bind(&phone)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_health_check() {
        assert!(live_store().await.health_check().await);
    }
}
