//! Rate limiting and other middleware.

use crate::error::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Global rate limiter (not keyed).
pub type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    /// Global rate limiter for API requests
    pub global: Arc<GlobalLimiter>,
}

impl RateLimitState {
    /// Create a new rate limit state with the specified limit.
    pub fn new(requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            global: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create a permissive rate limiter for testing.
    pub fn permissive() -> Self {
        Self::new(10_000)
    }
}

/// Per-phone-number limit on challenge issuance.
///
/// Numbers whose quota has fully replenished are pruned by a background
/// task, so the key set stays bounded by recent traffic.
pub struct PhoneRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl PhoneRateLimiter {
    /// Create a limiter and spawn its prune task.
    pub fn new(per_hour: u32) -> Self {
        let quota = Quota::per_hour(NonZeroU32::new(per_hour).unwrap_or(NonZeroU32::MIN));
        Self::with_quota(quota, Duration::from_secs(60))
    }

    /// Create a limiter with a custom quota and prune interval.
    pub fn with_quota(quota: Quota, prune_interval: Duration) -> Self {
        let limiter = Arc::new(RateLimiter::keyed(quota));

        let weak = Arc::downgrade(&limiter);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(prune_interval).await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                prune(&limiter);
            }
        });

        Self { limiter }
    }

    /// Record an attempt for `phone`, failing once its quota is spent.
    pub fn check(&self, phone: &str) -> Result<(), GatewayError> {
        self.limiter.check_key(&phone.to_string()).map_err(|_| {
            warn!(phone_number = %phone, "Per-number rate limit exceeded");
            GatewayError::RateLimitExceeded
        })
    }

    /// Number of tracked phone numbers.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

/// Drop numbers whose state is indistinguishable from a fresh key.
fn prune(limiter: &DefaultKeyedRateLimiter<String>) {
    let before = limiter.len();
    limiter.retain_recent();
    limiter.shrink_to_fit();

    let removed = before.saturating_sub(limiter.len());
    if removed > 0 {
        debug!("Pruned {} idle phone rate limit entries", removed);
    }
}

/// Rate limiting middleware.
///
/// Checks the global rate limit and returns 429 Too Many Requests if exceeded.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if rate_limit.global.check().is_err() {
        warn!("Global rate limit exceeded");
        return Err(GatewayError::RateLimitExceeded);
    }

    debug!("Rate limit check passed");
    Ok(next.run(request).await)
}

/// Logging middleware for requests.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    // Paths can carry codes and nonces.
    let path = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "<unmatched>".into());
    let start = std::time::Instant::now();

    debug!(%method, %path, "Request started");

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_success() {
        debug!(%method, %path, %status, ?duration, "Request completed");
    } else {
        warn!(%method, %path, %status, ?duration, "Request failed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_state_creation() {
        let state = RateLimitState::new(10);
        assert!(state.global.check().is_ok());
    }

    #[test]
    fn test_rate_limit_exhaustion() {
        let state = RateLimitState::new(1);

        assert!(state.global.check().is_ok());
        assert!(state.global.check().is_err());
    }

    #[test]
    fn test_permissive_rate_limit() {
        let state = RateLimitState::permissive();
        for _ in 0..100 {
            assert!(state.global.check().is_ok());
        }
    }

    #[tokio::test]
    async fn test_phone_limit_is_per_number() {
        let limiter = PhoneRateLimiter::new(2);

        assert!(limiter.check("+14155550100").is_ok());
        assert!(limiter.check("+14155550100").is_ok());
        assert!(matches!(
            limiter.check("+14155550100"),
            Err(GatewayError::RateLimitExceeded)
        ));
        assert!(limiter.check("+14155550101").is_ok());
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_numbers_are_pruned() {
        let quota = Quota::with_period(Duration::from_millis(10))
            .unwrap()
            .allow_burst(NonZeroU32::MIN);
        let limiter = PhoneRateLimiter::with_quota(quota, Duration::from_millis(20));

        for n in 0..1_000 {
            limiter.check(&format!("+1415555{:04}", n)).unwrap();
        }
        assert_eq!(limiter.len(), 1_000);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(limiter.is_empty());

        // A pruned number starts over with a full quota
        assert!(limiter.check("+14155550000").is_ok());
    }
}
