//! Client identities.
//!
//! A [`BotClient`] wraps one Telegram account (the userbot or the assistant
//! bot) with its lifecycle, command registry, plugins and dispatch loop.

mod state;
mod wrapper;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::telegram::{AuthMethod, TelegramError};

pub use state::{ClientState, format_uptime};
pub use wrapper::BotClient;

/// Pause between stopping and starting again on restart.
pub const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Which account a client runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Regular account logged in with the session string.
    Userbot,
    /// Bot account logged in with `BOT_TOKEN`.
    Assistant,
}

impl Identity {
    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Userbot => "Userbot",
            Self::Assistant => "Assistant Bot",
        }
    }

    /// File name (without extension) of the identity's session file.
    #[must_use]
    pub const fn session_name(self) -> &'static str {
        match self {
            Self::Userbot => "nexus_userbot",
            Self::Assistant => "nexus_assistant",
        }
    }

    /// Command prefix for this identity.
    #[must_use]
    pub fn prefix(self, config: &Config) -> &str {
        match self {
            Self::Userbot => &config.command_prefix,
            Self::Assistant => &config.assistant_prefix,
        }
    }

    /// Picks the authentication method the identity must use.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingAuth`] when the credential is not configured.
    pub fn auth_method(self, config: &Config) -> Result<AuthMethod, ClientError> {
        match self {
            Self::Userbot if !config.session_string.is_empty() => {
                Ok(AuthMethod::SessionString(config.session_string.clone()))
            }
            Self::Userbot => Err(ClientError::MissingAuth {
                identity: self,
                variable: "SESSION_STRING",
            }),
            Self::Assistant => config
                .bot_token
                .clone()
                .map(AuthMethod::BotToken)
                .ok_or(ClientError::MissingAuth {
                    identity: self,
                    variable: "BOT_TOKEN",
                }),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors from client lifecycle operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client state transition: {from} -> {to}")]
    InvalidState { from: ClientState, to: ClientState },

    #[error("{identity} cannot start: {variable} is not set")]
    MissingAuth {
        identity: Identity,
        variable: &'static str,
    },

    #[error("Session string is invalid or expired, regenerate it with generate_session: {0}")]
    InvalidSession(String),

    #[error(transparent)]
    Telegram(#[from] TelegramError),
}
