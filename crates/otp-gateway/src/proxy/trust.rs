//! Challenge finalization with identity-claim injection.

use super::forwarder::{ForwardRequest, ForwardResponse, UpstreamForwarder};
use crate::challenge::{consume_nonce, phone_key, NonceCheck};
use crate::error::{GatewayError, GatewayResult};
use crate::identity::IdentityResolver;
use crate::store::EphemeralStore;
use crate::token::TokenMinter;
use axum::http::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Consumes a challenge, then forwards the caller's request downstream with
/// a claim header asserting the verified user.
#[derive(Clone)]
pub struct TrustProxy {
    store: Arc<dyn EphemeralStore>,
    identity: IdentityResolver,
    minter: Arc<TokenMinter>,
    forwarder: Arc<dyn UpstreamForwarder>,
    claim_header: HeaderName,
    client_id: String,
}

impl TrustProxy {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        identity: IdentityResolver,
        minter: Arc<TokenMinter>,
        forwarder: Arc<dyn UpstreamForwarder>,
        claim_header: &str,
        client_id: impl Into<String>,
    ) -> GatewayResult<Self> {
        let claim_header = HeaderName::from_bytes(claim_header.as_bytes()).map_err(|e| {
            GatewayError::Internal(format!("Invalid claim header {:?}: {}", claim_header, e))
        })?;

        Ok(Self {
            store,
            identity,
            minter,
            forwarder,
            claim_header,
            client_id: client_id.into(),
        })
    }

    /// Consume the challenge for `code` and relay `request`.
    ///
    /// Any failure to prove the challenge is `Unauthorized`. Inbound copies
    /// of the claim header are dropped before ours is added.
    #[instrument(skip(self, code, nonce, request), fields(method = %request.method))]
    pub async fn finalize(
        &self,
        code: &str,
        nonce: &str,
        mut request: ForwardRequest,
    ) -> GatewayResult<ForwardResponse> {
        match consume_nonce(self.store.as_ref(), code, nonce).await? {
            NonceCheck::Matched => {}
            NonceCheck::Mismatched => {
                warn!("Nonce mismatch on finalize, challenge burned");
                return Err(GatewayError::Unauthorized);
            }
            NonceCheck::Missing => return Err(GatewayError::Unauthorized),
        }

        let phone = self
            .store
            .take(&phone_key(code))
            .await?
            .ok_or(GatewayError::Unauthorized)?;

        let user_id = self.identity.resolve(&phone).await?;
        let claims = self.minter.claims_for(user_id.as_str(), self.client_id.as_str());
        let token = self.minter.mint(&claims)?;
        let claim = HeaderValue::from_str(&token)
            .map_err(|e| GatewayError::SigningFailure(e.to_string()))?;

        request.headers.remove(&self.claim_header);
        request.headers.insert(self.claim_header.clone(), claim);

        info!(phone_number = %phone, user_id = %user_id, "Challenge finalized, forwarding");
        self.forwarder.forward(request).await
    }
}
