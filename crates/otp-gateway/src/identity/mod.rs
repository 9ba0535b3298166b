//! User identity resolution keyed by phone number.

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use crate::error::GatewayResult;
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Prefix for generated user ids.
pub const USER_ID_PREFIX: &str = "u-";

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque stable identifier
    pub id: String,
    /// Canonical phone number, unique across users
    pub phone: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Relational user table with a unique constraint on phone number.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user with `candidate_id` or, if `phone` already belongs to a
    /// user, return that user's id. Must be a single atomic operation.
    async fn upsert(&self, phone: &str, candidate_id: &str) -> GatewayResult<String>;

    /// Check backend connectivity.
    async fn health_check(&self) -> bool;
}

/// Maps verified phone numbers to stable user ids.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Resolve the user owning `phone`, creating one on first sight.
    ///
    /// The candidate id is drawn before the write so the store can settle
    /// concurrent first registrations in one statement.
    #[instrument(skip(self))]
    pub async fn resolve(&self, phone: &str) -> GatewayResult<String> {
        let candidate = candidate_user_id();
        let user_id = self.users.upsert(phone, &candidate).await?;
        debug!(created = user_id == candidate, "Resolved user");
        Ok(user_id)
    }
}

/// Random user id: fixed prefix plus 128 random bits in hex.
pub fn candidate_user_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", USER_ID_PREFIX, hex::encode(bytes))
}
