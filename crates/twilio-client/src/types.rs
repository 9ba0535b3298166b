//! Twilio Messaging API types.

use serde::{Deserialize, Serialize};

/// Form body for `POST /2010-04-01/Accounts/{sid}/Messages.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageForm<'a> {
    #[serde(rename = "MessagingServiceSid")]
    pub messaging_service_sid: &'a str,
    #[serde(rename = "To")]
    pub to: &'a str,
    #[serde(rename = "Body")]
    pub body: &'a str,
}

/// Message resource returned by Twilio on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResource {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Error document returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}
