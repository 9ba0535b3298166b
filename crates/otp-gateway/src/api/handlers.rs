//! HTTP request handlers.
//!
//! Bodies are decoded as JSON whatever their content type. Successful
//! replies to `/init`, `/verify` and `/login` are bare text.

use super::types::{parse_body, HealthResponse, InitRequest, LoginRequest, VerifyRequest};
use super::AppState;
use crate::error::GatewayError;
use crate::phone;
use crate::proxy::ForwardRequest;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (store_healthy, database_healthy) =
        tokio::join!(state.store.health_check(), state.users.health_check());

    Json(HealthResponse {
        status: if store_healthy && database_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        store_healthy,
        database_healthy,
        direct_issue_enabled: state.direct.is_enabled(),
    })
}

/// Issue a challenge and reply with its nonce.
pub async fn init(State(state): State<AppState>, body: Bytes) -> Result<String, GatewayError> {
    let request: InitRequest = parse_body(&body)?;
    let number = phone::canonicalize(&request.phone_number)?;
    state.phone_limiter.check(&number)?;

    info!(phone_number = %number, "Challenge requested");
    state.issuer.issue(&number).await
}

/// Redeem a code/nonce pair and reply with a signed token.
pub async fn verify(State(state): State<AppState>, body: Bytes) -> Result<String, GatewayError> {
    let request: VerifyRequest = parse_body(&body)?;

    state
        .verifier
        .verify(&request.code, &request.nonce, &request.clientid)
        .await
}

/// Redeem a challenge and relay the request body downstream with an
/// identity claim attached.
pub async fn register(
    State(state): State<AppState>,
    Path((code, nonce)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let forwarded = state
        .proxy
        .finalize(
            &code,
            &nonce,
            ForwardRequest {
                method,
                headers,
                body,
            },
        )
        .await?;

    let mut response = forwarded.body.into_response();
    *response.status_mut() = forwarded.status;
    *response.headers_mut() = forwarded.headers;
    Ok(response)
}

/// Mint a token for a caller-supplied user id, gated by the login key.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<String, GatewayError> {
    let grant = state.direct.authorize(bearer_token(&headers))?;
    let request: LoginRequest = parse_body(&body)?;

    info!(user_id = %request.userid, clientid = %request.clientid, "Direct token issued");
    state.direct.issue(grant, &request.userid, &request.clientid)
}

/// Extract the credential from an `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}
