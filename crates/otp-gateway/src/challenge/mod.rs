//! One-time passcode challenges.
//!
//! A challenge is a 6-digit code paired with a 128-bit nonce, stored as two
//! entries keyed by the code: `{code}nonce -> nonce` and `{code}phone -> phone`.
//! Both entries get the same TTL but expire independently, so a consumer that
//! finds either one missing treats the whole challenge as invalid.
//!
//! Lifecycle: issued, then consumed by a verify or finalize, or left to
//! expire. Consumption always starts by atomically taking the nonce entry,
//! so a code/nonce pair succeeds at most once.

mod issuer;
mod verifier;

pub use issuer::ChallengeIssuer;
pub use verifier::ChallengeVerifier;

use crate::error::GatewayResult;
use crate::store::EphemeralStore;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::time::Duration;

/// Number of distinct passcodes.
pub const CODE_SPACE: u32 = 1_000_000;

/// Key suffix for the nonce entry.
pub const NONCE_SUFFIX: &str = "nonce";

/// Key suffix for the phone entry.
pub const PHONE_SUFFIX: &str = "phone";

/// A freshly issued challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub code: String,
    pub nonce: String,
    pub phone: String,
    pub ttl: Duration,
}

impl Challenge {
    /// Draw a new code and nonce for a canonical phone number.
    pub fn generate(phone: impl Into<String>, ttl: Duration) -> Self {
        Self {
            code: generate_code(),
            nonce: generate_nonce(),
            phone: phone.into(),
            ttl,
        }
    }

    pub fn nonce_key(&self) -> String {
        nonce_key(&self.code)
    }

    pub fn phone_key(&self) -> String {
        phone_key(&self.code)
    }
}

/// Uniform draw from `[0, 1_000_000)`, zero-padded to six digits.
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..CODE_SPACE))
}

/// 128 random bits, hex-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn nonce_key(code: &str) -> String {
    format!("{}{}", code, NONCE_SUFFIX)
}

pub fn phone_key(code: &str) -> String {
    format!("{}{}", code, PHONE_SUFFIX)
}

/// Result of consuming a nonce entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NonceCheck {
    /// Entry existed and matched; it is now gone.
    Matched,
    /// Entry existed but did not match; it is gone regardless.
    Mismatched,
    /// Entry was absent: expired, never issued, or already consumed.
    Missing,
}

/// Atomically take the nonce entry for `code` and compare it.
///
/// The entry is removed before comparing, so a wrong guess burns the
/// challenge.
pub(crate) async fn consume_nonce(
    store: &dyn EphemeralStore,
    code: &str,
    supplied: &str,
) -> GatewayResult<NonceCheck> {
    let check = match store.take(&nonce_key(code)).await? {
        None => NonceCheck::Missing,
        Some(stored) if stored == supplied => NonceCheck::Matched,
        Some(_) => NonceCheck::Mismatched,
    };
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_code_format() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_nonce_format() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_nonce(), nonce);
    }

    #[test]
    fn test_keys_share_code_prefix() {
        let challenge = Challenge::generate("+14155550100", Duration::from_secs(60));
        assert_eq!(challenge.nonce_key(), format!("{}nonce", challenge.code));
        assert_eq!(challenge.phone_key(), format!("{}phone", challenge.code));
    }

    #[tokio::test]
    async fn test_consume_nonce_outcomes() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        store.set(&nonce_key("000001"), "n1", ttl).await.unwrap();
        assert_eq!(
            consume_nonce(&store, "000001", "n1").await.unwrap(),
            NonceCheck::Matched
        );
        assert_eq!(
            consume_nonce(&store, "000001", "n1").await.unwrap(),
            NonceCheck::Missing
        );

        store.set(&nonce_key("000002"), "n2", ttl).await.unwrap();
        assert_eq!(
            consume_nonce(&store, "000002", "guess").await.unwrap(),
            NonceCheck::Mismatched
        );
        // A wrong guess burns the nonce.
        assert_eq!(
            consume_nonce(&store, "000002", "n2").await.unwrap(),
            NonceCheck::Missing
        );
    }
}
