//! HTTP API for the gateway.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{
    logging_middleware, rate_limit_middleware, PhoneRateLimiter, RateLimitState,
};
pub use types::*;

use crate::challenge::{ChallengeIssuer, ChallengeVerifier};
use crate::config::Config;
use crate::error::GatewayResult;
use crate::identity::{IdentityResolver, UserStore};
use crate::notify::{MessageTemplate, Notifier};
use crate::proxy::{TrustProxy, UpstreamForwarder};
use crate::store::EphemeralStore;
use crate::token::{DirectIssuer, TokenMinter};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// External collaborators the gateway is wired to.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn EphemeralStore>,
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<dyn Notifier>,
    pub forwarder: Arc<dyn UpstreamForwarder>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<ChallengeIssuer>,
    pub verifier: Arc<ChallengeVerifier>,
    pub proxy: Arc<TrustProxy>,
    pub direct: Arc<DirectIssuer>,
    /// Ephemeral store, kept for health checks
    pub store: Arc<dyn EphemeralStore>,
    /// User table, kept for health checks
    pub users: Arc<dyn UserStore>,
    /// Per-number limit on challenge issuance
    pub phone_limiter: Arc<PhoneRateLimiter>,
}

impl AppState {
    /// Build every component from configuration and its backends.
    pub fn new(config: &Config, backends: Backends) -> GatewayResult<Self> {
        let Backends {
            store,
            users,
            notifier,
            forwarder,
        } = backends;

        let minter = Arc::new(TokenMinter::new(&config.token.secret, config.token.ttl));
        let identity = IdentityResolver::new(users.clone());

        let issuer = ChallengeIssuer::new(
            store.clone(),
            notifier,
            MessageTemplate::new(config.challenge.message_template.clone()),
            config.challenge.ttl,
        );
        let verifier = ChallengeVerifier::new(store.clone(), identity.clone(), minter.clone());
        let proxy = TrustProxy::new(
            store.clone(),
            identity,
            minter.clone(),
            forwarder,
            &config.upstream.claim_header,
            config.upstream.client_id.clone(),
        )?;
        let direct = DirectIssuer::new(minter, config.login.api_key.as_ref());

        Ok(Self {
            issuer: Arc::new(issuer),
            verifier: Arc::new(verifier),
            proxy: Arc::new(proxy),
            direct: Arc::new(direct),
            store,
            users,
            phone_limiter: Arc::new(PhoneRateLimiter::new(
                config.rate_limit.per_number_per_hour,
            )),
        })
    }
}

/// Create the API router with default rate limiting.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(120), Duration::from_secs(30))
}

/// Create the API router with custom rate limiting and request deadline.
pub fn create_router_with_rate_limit(
    state: AppState,
    rate_limit: RateLimitState,
    request_timeout: Duration,
) -> Router {
    let api = Router::new()
        .route("/init", post(handlers::init))
        .route("/verify", post(handlers::verify))
        .route("/register/:code/:nonce", post(handlers::register))
        .route("/login", post(handlers::login))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        // Health check (no rate limiting)
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span keyed by route template; raw paths carry codes and nonces.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("<unmatched>");

    tracing::debug_span!("request", method = %request.method(), route)
}
