//! OTP Gateway - phone-number identity service.
//!
//! The gateway proves control of a phone number with a one-time passcode
//! and then either:
//! - Mints a signed claim token for the user owning that number (`/verify`)
//! - Relays a registration request downstream with the claim attached (`/register`)

pub mod api;
pub mod challenge;
pub mod config;
pub mod error;
pub mod identity;
pub mod notify;
pub mod phone;
pub mod proxy;
pub mod store;
pub mod token;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use identity::{IdentityResolver, MemoryUserStore, PgUserStore, UserStore};
pub use notify::{Notifier, TwilioNotifier};
pub use proxy::{HttpForwarder, TrustProxy, UpstreamForwarder};
pub use store::{EphemeralStore, MemoryStore, RedisStore};
pub use token::{ClaimSet, DirectIssuer, TokenMinter};
