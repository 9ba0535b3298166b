//! HTTP forwarding to the downstream service.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Headers scoped to a single connection, never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Request to relay downstream.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Downstream response, body still streaming.
#[derive(Debug)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Relays a request to the fixed downstream endpoint.
#[async_trait]
pub trait UpstreamForwarder: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> GatewayResult<ForwardResponse>;
}

/// Forwarder over HTTP(S) with a per-request deadline.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client,
    target: String,
}

impl HttpForwarder {
    pub fn new(target: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            target: target.into(),
        })
    }
}

#[async_trait]
impl UpstreamForwarder for HttpForwarder {
    #[instrument(skip(self, request), fields(target = %self.target, method = %request.method))]
    async fn forward(&self, request: ForwardRequest) -> GatewayResult<ForwardResponse> {
        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let response = self
            .client
            .request(request.method, &self.target)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Downstream request failed");
                GatewayError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if status.is_server_error() {
            warn!(%status, "Downstream returned server error");
            return Err(GatewayError::Upstream(format!("downstream status {}", status)));
        }

        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        debug!(%status, "Downstream responded");

        Ok(ForwardResponse {
            status,
            headers,
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}
