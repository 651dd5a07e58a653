//! Telegram access for both client identities.
//!
//! Provides the backend trait the rest of the crate talks to, its grammers
//! implementation, peer id conversion, and rate limiting.

mod backend;
mod client;
mod peer;
mod rate_limiter;

pub use backend::{AuthMethod, Connection, InboundMessage, MessageStream, SelfInfo, TelegramBackend};
pub use client::{GrammersBackend, GrammersClient, QrAuthResult, TelegramError};
pub use grammers_client::client::{LoginToken, PasswordToken};
pub use peer::PeerKind;
pub use rate_limiter::{DEFAULT_CHAT_INTERVAL, RateLimiter};
