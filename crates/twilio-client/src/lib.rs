//! Twilio Programmable Messaging REST API client.

mod client;
mod error;
mod types;

pub use client::{TwilioClient, DEFAULT_API_URL};
pub use error::TwilioError;
pub use types::*;
