//! Challenge verification and credential issue.

use super::{consume_nonce, phone_key, NonceCheck};
use crate::error::{GatewayError, GatewayResult};
use crate::identity::IdentityResolver;
use crate::store::EphemeralStore;
use crate::token::TokenMinter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Redeems a code/nonce pair for a signed claim token.
#[derive(Clone)]
pub struct ChallengeVerifier {
    store: Arc<dyn EphemeralStore>,
    identity: IdentityResolver,
    minter: Arc<TokenMinter>,
}

impl ChallengeVerifier {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        identity: IdentityResolver,
        minter: Arc<TokenMinter>,
    ) -> Self {
        Self {
            store,
            identity,
            minter,
        }
    }

    /// Consume the challenge for `code` and mint a token for its phone's user.
    ///
    /// A mismatch burns the nonce but leaves the phone entry to expire.
    #[instrument(skip(self, code, nonce))]
    pub async fn verify(&self, code: &str, nonce: &str, client_id: &str) -> GatewayResult<String> {
        match consume_nonce(self.store.as_ref(), code, nonce).await? {
            NonceCheck::Matched => {}
            NonceCheck::Missing => return Err(GatewayError::ChallengeNotFound),
            NonceCheck::Mismatched => {
                warn!("Nonce mismatch, challenge burned");
                return Err(GatewayError::ChallengeMismatch);
            }
        }

        let phone = self
            .store
            .take(&phone_key(code))
            .await?
            .ok_or(GatewayError::ChallengeNotFound)?;

        let user_id = self.identity.resolve(&phone).await?;
        let claims = self.minter.claims_for(user_id.as_str(), client_id);
        let token = self.minter.mint(&claims)?;

        info!(phone_number = %phone, user_id = %user_id, "Challenge verified");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{nonce_key, Challenge};
    use crate::identity::MemoryUserStore;
    use crate::store::MemoryStore;
    use crate::token::ClaimSet;
    use secrecy::SecretString;
    use std::time::Duration;

    struct Fixture {
        store: MemoryStore,
        users: MemoryUserStore,
        minter: Arc<TokenMinter>,
        verifier: ChallengeVerifier,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let users = MemoryUserStore::new();
        let minter = Arc::new(TokenMinter::new(&SecretString::new("secret".into()), None));
        let verifier = ChallengeVerifier::new(
            Arc::new(store.clone()),
            IdentityResolver::new(Arc::new(users.clone())),
            minter.clone(),
        );
        Fixture {
            store,
            users,
            minter,
            verifier,
        }
    }

    async fn seed(store: &MemoryStore, phone: &str) -> Challenge {
        let challenge = Challenge::generate(phone, Duration::from_secs(60));
        store
            .set(&challenge.nonce_key(), &challenge.nonce, challenge.ttl)
            .await
            .unwrap();
        store
            .set(&challenge.phone_key(), &challenge.phone, challenge.ttl)
            .await
            .unwrap();
        challenge
    }

    #[tokio::test]
    async fn test_verify_mints_token_for_user() {
        let f = fixture();
        let challenge = seed(&f.store, "+14155550100").await;

        let token = f
            .verifier
            .verify(&challenge.code, &challenge.nonce, "client-1")
            .await
            .unwrap();

        let user = f.users.find_by_phone("+14155550100").await.unwrap();
        assert_eq!(
            f.minter.decode(&token).unwrap(),
            ClaimSet::new(user.id, "client-1")
        );
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_replay_is_not_found() {
        let f = fixture();
        let challenge = seed(&f.store, "+14155550100").await;

        f.verifier
            .verify(&challenge.code, &challenge.nonce, "client-1")
            .await
            .unwrap();
        let replay = f
            .verifier
            .verify(&challenge.code, &challenge.nonce, "client-1")
            .await;

        assert!(matches!(replay, Err(GatewayError::ChallengeNotFound)));
    }

    #[tokio::test]
    async fn test_mismatch_burns_nonce_and_leaves_phone() {
        let f = fixture();
        let challenge = seed(&f.store, "+14155550100").await;

        let result = f
            .verifier
            .verify(&challenge.code, "wrong-nonce", "client-1")
            .await;
        assert!(matches!(result, Err(GatewayError::ChallengeMismatch)));

        assert!(f.store.get(&nonce_key(&challenge.code)).await.unwrap().is_none());
        assert!(f.store.get(&challenge.phone_key()).await.unwrap().is_some());

        let retry = f
            .verifier
            .verify(&challenge.code, &challenge.nonce, "client-1")
            .await;
        assert!(matches!(retry, Err(GatewayError::ChallengeNotFound)));
        assert_eq!(f.users.count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_phone_entry_is_not_found() {
        let f = fixture();
        let challenge = seed(&f.store, "+14155550100").await;
        f.store.delete(&challenge.phone_key()).await.unwrap();

        let result = f
            .verifier
            .verify(&challenge.code, &challenge.nonce, "client-1")
            .await;

        assert!(matches!(result, Err(GatewayError::ChallengeNotFound)));
        assert_eq!(f.users.count().await, 0);
    }

    #[tokio::test]
    async fn test_same_phone_resolves_same_user() {
        let f = fixture();

        let first = seed(&f.store, "+14155550100").await;
        let t1 = f
            .verifier
            .verify(&first.code, &first.nonce, "a")
            .await
            .unwrap();

        let second = seed(&f.store, "+14155550100").await;
        let t2 = f
            .verifier
            .verify(&second.code, &second.nonce, "b")
            .await
            .unwrap();

        let c1 = f.minter.decode(&t1).unwrap();
        let c2 = f.minter.decode(&t2).unwrap();
        assert_eq!(c1.userid, c2.userid);
        assert_eq!(c2.clientid, "b");
    }
}
