//! Claim token minting.
//!
//! Tokens are HS256 JWTs signed with a secret shared with downstream
//! services. Two entry points exist and are deliberately separate types:
//! [`TokenMinter`] for identities proven by a phone challenge, and
//! [`DirectIssuer`] for the bypass path that mints for a caller-supplied id.

use crate::error::{GatewayError, GatewayResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub userid: String,
    pub clientid: String,
    /// Expiry (unix seconds), present only when a token lifetime is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl ClaimSet {
    pub fn new(userid: impl Into<String>, clientid: impl Into<String>) -> Self {
        Self {
            userid: userid.into(),
            clientid: clientid.into(),
            exp: None,
        }
    }
}

/// Signs and verifies claim tokens.
#[derive(Clone)]
pub struct TokenMinter {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Option<Duration>,
}

impl TokenMinter {
    pub fn new(secret: &SecretString, ttl: Option<Duration>) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Build the claim set for a user, stamping `exp` when configured.
    pub fn claims_for(&self, userid: impl Into<String>, clientid: impl Into<String>) -> ClaimSet {
        let mut claims = ClaimSet::new(userid, clientid);
        claims.exp = self
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .map(|at| at.timestamp());
        claims
    }

    /// Sign a claim set. Same claims and secret always give the same token.
    pub fn mint(&self, claims: &ClaimSet) -> GatewayResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify a token's signature (and expiry, when it has one).
    pub fn decode(&self, token: &str) -> GatewayResult<ClaimSet> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();

        decode::<ClaimSet>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| GatewayError::Unauthorized)
    }
}

/// Proof that a caller passed the direct-issue policy.
///
/// Only [`DirectIssuer::authorize`] constructs one.
#[derive(Debug)]
pub struct DirectIssueGrant {
    _private: (),
}

/// Mints tokens for caller-supplied user ids with no phone verification.
///
/// Gated by its own bearer key; without one configured it refuses every
/// request.
#[derive(Clone)]
pub struct DirectIssuer {
    minter: Arc<TokenMinter>,
    api_key_hash: Option<[u8; 32]>,
}

impl DirectIssuer {
    pub fn new(minter: Arc<TokenMinter>, api_key: Option<&SecretString>) -> Self {
        let api_key_hash = api_key
            .map(|key| key.expose_secret())
            .filter(|key| !key.is_empty())
            .map(|key| digest(key));

        if api_key_hash.is_some() {
            info!("Direct token issue enabled");
        } else {
            warn!("Direct token issue disabled (no login api key configured)");
        }

        Self {
            minter,
            api_key_hash,
        }
    }

    /// Whether the bypass path is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.api_key_hash.is_some()
    }

    /// Check a presented bearer key against the configured one.
    pub fn authorize(&self, presented: Option<&str>) -> GatewayResult<DirectIssueGrant> {
        let expected = self.api_key_hash.ok_or(GatewayError::DirectIssueDisabled)?;
        match presented {
            Some(key) if digest(key) == expected => Ok(DirectIssueGrant { _private: () }),
            _ => Err(GatewayError::Unauthorized),
        }
    }

    /// Mint a token for an arbitrary user id.
    pub fn issue(
        &self,
        _grant: DirectIssueGrant,
        userid: &str,
        clientid: &str,
    ) -> GatewayResult<String> {
        let claims = self.minter.claims_for(userid, clientid);
        self.minter.mint(&claims)
    }
}

/// SHA-256 so comparisons run over fixed-size digests.
fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
