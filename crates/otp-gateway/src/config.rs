//! Configuration for the gateway.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Gateway configuration.
///
/// Built once at startup and handed to each component's constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// OTP challenge configuration
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Claim token configuration
    pub token: TokenConfig,

    /// Twilio SMS transport configuration
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Ephemeral store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Relational store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Downstream core service configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Direct issue (login bypass) configuration
    #[serde(default)]
    pub login: LoginConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline for a whole request, outbound calls included
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    /// Lifetime of an issued code/nonce pair
    #[serde(default = "default_challenge_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// SMS body; `{code}` is replaced with the passcode
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret shared with downstream services
    pub secret: SecretString,

    /// Optional lifetime; tokens carry no `exp` claim when unset
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    /// REST API base URL
    #[serde(default = "default_twilio_url")]
    pub api_url: String,

    /// Account SID
    #[serde(default)]
    pub account_sid: String,

    /// Auth token
    #[serde(default = "empty_secret")]
    pub auth_token: SecretString,

    /// Messaging service SID used as sender
    #[serde(default)]
    pub messaging_service_sid: String,

    /// Request timeout
    #[serde(default = "default_outbound_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Redis URL (in-process store when unset)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Deadline for a single store operation
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub op_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL (in-process user table when unset)
    #[serde(default)]
    pub url: Option<String>,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Deadline for acquiring a pooled connection
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Core service endpoint that receives finalized registrations
    #[serde(default = "default_core_url")]
    pub core_url: String,

    /// Header carrying the injected identity claim
    #[serde(default = "default_claim_header")]
    pub claim_header: String,

    /// `clientid` placed in the injected claim
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Request timeout
    #[serde(default = "default_outbound_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginConfig {
    /// Bearer key required by `/login`; the endpoint is disabled when unset
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_global_rpm")]
    pub global_per_minute: u32,

    /// Challenges per phone number per hour
    #[serde(default = "default_per_number_rph")]
    pub per_number_per_hour: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl: default_challenge_ttl(),
            message_template: default_message_template(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            api_url: default_twilio_url(),
            account_sid: String::new(),
            auth_token: empty_secret(),
            messaging_service_sid: String::new(),
            timeout: default_outbound_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            op_timeout: default_store_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout: default_store_timeout(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            core_url: default_core_url(),
            claim_header: default_claim_header(),
            client_id: default_client_id(),
            timeout: default_outbound_timeout(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_rpm(),
            per_number_per_hour: default_per_number_rph(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_challenge_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_message_template() -> String {
    "Your OTP for Beep is {code}".into()
}

fn default_twilio_url() -> String {
    twilio_client::DEFAULT_API_URL.into()
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_outbound_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_connections() -> u32 {
    10
}

fn default_core_url() -> String {
    "http://core:8080/users".into()
}

fn default_claim_header() -> String {
    "X-User-Claim".into()
}

fn default_client_id() -> String {
    "otp-gateway".into()
}

fn default_global_rpm() -> u32 {
    120
}

fn default_per_number_rph() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
