//! Challenge issuance.

use super::Challenge;
use crate::error::{GatewayError, GatewayResult};
use crate::notify::{MessageTemplate, Notifier};
use crate::phone;
use crate::store::EphemeralStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Creates challenges and sends their codes by SMS.
#[derive(Clone)]
pub struct ChallengeIssuer {
    store: Arc<dyn EphemeralStore>,
    notifier: Arc<dyn Notifier>,
    template: MessageTemplate,
    ttl: Duration,
}

impl ChallengeIssuer {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        notifier: Arc<dyn Notifier>,
        template: MessageTemplate,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            template,
            ttl,
        }
    }

    /// Issue a challenge for a raw phone number and return its nonce.
    ///
    /// The number is validated before anything is written. If delivery fails
    /// the stored entries are left to expire on their own.
    #[instrument(skip(self))]
    pub async fn issue(&self, raw_phone: &str) -> GatewayResult<String> {
        let phone = phone::canonicalize(raw_phone)?;
        let challenge = Challenge::generate(phone, self.ttl);

        self.store
            .set(&challenge.nonce_key(), &challenge.nonce, challenge.ttl)
            .await?;
        self.store
            .set(&challenge.phone_key(), &challenge.phone, challenge.ttl)
            .await?;

        let body = self.template.render(&challenge.code);
        if let Err(e) = self.notifier.send(&challenge.phone, &body).await {
            warn!(phone_number = %challenge.phone, error = %e, "Passcode delivery failed");
            return Err(match e {
                GatewayError::NotificationFailure(_) => e,
                other => GatewayError::NotificationFailure(other.to_string()),
            });
        }

        info!(phone_number = %challenge.phone, ttl = ?challenge.ttl, "Challenge issued");
        Ok(challenge.nonce)
    }
}
