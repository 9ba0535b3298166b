//! API request and response types.

use crate::error::GatewayResult;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request to issue a challenge.
#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub phone_number: String,
}

/// Request to redeem a challenge for a token.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
    pub nonce: String,
    pub clientid: String,
}

/// Request to mint a token directly for a known user id.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub userid: String,
    pub clientid: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
    pub database_healthy: bool,
    pub direct_issue_enabled: bool,
}

/// Decode a JSON body regardless of its declared content type.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> GatewayResult<T> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn test_parse_verify_request() {
        let body = Bytes::from_static(br#"{"code":"012345","nonce":"ab","clientid":"c"}"#);
        let request: VerifyRequest = parse_body(&body).unwrap();
        assert_eq!(request.code, "012345");
        assert_eq!(request.clientid, "c");
    }

    #[test]
    fn test_parse_malformed_body() {
        let result = parse_body::<InitRequest>(&Bytes::from_static(b"{phone"));
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));

        let result = parse_body::<InitRequest>(&Bytes::from_static(b"{}"));
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
}
