//! Out-of-band delivery of passcodes.

use crate::error::GatewayResult;
use async_trait::async_trait;
use tracing::{info, instrument};
use twilio_client::TwilioClient;

/// Placeholder replaced with the passcode in message templates.
pub const CODE_PLACEHOLDER: &str = "{code}";

/// Sends a text message to a phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `body` to `to`. Transport errors and non-success responses
    /// are both failures.
    async fn send(&self, to: &str, body: &str) -> GatewayResult<()>;
}

/// SMS body template.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    template: String,
}

impl MessageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the message for a passcode. Templates without a placeholder
    /// get the code appended.
    pub fn render(&self, code: &str) -> String {
        if self.template.contains(CODE_PLACEHOLDER) {
            self.template.replace(CODE_PLACEHOLDER, code)
        } else {
            format!("{} {}", self.template.trim_end(), code)
        }
    }
}

/// Notifier backed by Twilio Programmable Messaging.
#[derive(Clone)]
pub struct TwilioNotifier {
    client: TwilioClient,
}

impl TwilioNotifier {
    pub fn new(client: TwilioClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, body: &str) -> GatewayResult<()> {
        let message = self.client.send_message(to, body).await?;
        info!(sid = %message.sid, "SMS accepted by Twilio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use secrecy::SecretString;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_render_template() {
        let template = MessageTemplate::new("Your OTP for Beep is {code}");
        assert_eq!(template.render("012345"), "Your OTP for Beep is 012345");

        let bare = MessageTemplate::new("Code:");
        assert_eq!(bare.render("999999"), "Code: 999999");
    }

    async fn notifier_for(mock_server: &MockServer) -> TwilioNotifier {
        let client = TwilioClient::new(
            mock_server.uri(),
            "AC1",
            SecretString::new("token".into()),
            "MG1",
            Duration::from_secs(5),
        )
        .unwrap();
        TwilioNotifier::new(client)
    }

    #[tokio::test]
    async fn test_twilio_notifier_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC1/Messages.json"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM1"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = notifier_for(&mock_server).await;
        notifier.send("+14155550100", "hi").await.unwrap();
    }

    #[tokio::test]
    async fn test_twilio_notifier_rejection_is_notification_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let notifier = notifier_for(&mock_server).await;
        let result = notifier.send("+14155550100", "hi").await;
        assert!(matches!(result, Err(GatewayError::NotificationFailure(_))));
    }
}
