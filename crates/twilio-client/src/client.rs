//! Twilio HTTP client.

use crate::error::TwilioError;
use crate::types::*;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

/// Default Twilio REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.twilio.com";

/// Twilio Programmable Messaging client.
///
/// The auth token is stored using `SecretString` so it never shows up in
/// debug output. TLS certificates are always validated.
#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: SecretString,
    messaging_service_sid: String,
}

impl TwilioClient {
    /// Create a new Twilio client.
    pub fn new(
        base_url: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: SecretString,
        messaging_service_sid: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TwilioError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token,
            messaging_service_sid: messaging_service_sid.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url,
            encode(&self.account_sid)
        )
    }

    /// Send a text message through the configured messaging service.
    #[instrument(skip(self, body))]
    pub async fn send_message(&self, to: &str, body: &str) -> Result<MessageResource, TwilioError> {
        let form = SendMessageForm {
            messaging_service_sid: &self.messaging_service_sid,
            to,
            body,
        };

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            warn!(status = %status, error = %message, "Twilio rejected message");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let message: MessageResource = serde_json::from_str(&text)?;
        debug!(sid = %message.sid, status = ?message.status, "Message queued");
        Ok(message)
    }
}
