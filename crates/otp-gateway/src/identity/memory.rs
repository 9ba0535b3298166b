//! In-process user table.

use super::{User, UserStore};
use crate::error::GatewayResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory user table indexed by phone number.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user by phone number.
    pub async fn find_by_phone(&self, phone: &str) -> Option<User> {
        self.users.read().await.get(phone).cloned()
    }

    /// Number of users.
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, phone: &str, candidate_id: &str) -> GatewayResult<String> {
        let mut users = self.users.write().await;
        let user = users.entry(phone.to_string()).or_insert_with(|| User {
            id: candidate_id.to_string(),
            phone: phone.to_string(),
            first_name: None,
            last_name: None,
        });
        Ok(user.id.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
