//! The seam between the userbot and the Telegram protocol library.
//!
//! [`TelegramBackend`] is what a client identity needs from Telegram:
//! connect with an [`AuthMethod`], receive messages, send text, disconnect.
//! The grammers implementation lives in [`super::GrammersBackend`]; tests
//! use in-memory implementations.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::TelegramError;

/// How an identity authenticates with Telegram.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Bot API token, used by the assistant identity.
    BotToken(String),
    /// Pre-generated session string, used by the userbot identity.
    SessionString(String),
}

impl AuthMethod {
    /// Human-readable name for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BotToken(_) => "bot token",
            Self::SessionString(_) => "session string",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print credentials
        write!(f, "AuthMethod({})", self.label())
    }
}

/// The account a backend is logged in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub is_bot: bool,
    pub is_premium: bool,
}

impl SelfInfo {
    /// `@username`, or `N/A` when the account has none.
    #[must_use]
    pub fn mention(&self) -> String {
        self.username
            .as_deref()
            .map_or_else(|| "N/A".to_owned(), |u| format!("@{u}"))
    }
}

/// A text message received by an identity.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    /// Message id within its chat.
    fn id(&self) -> i32;

    /// Bot API style id of the chat the message was posted in.
    fn chat_id(&self) -> i64;

    /// Bot API style id of the sender, when known.
    fn sender_id(&self) -> Option<i64>;

    /// Message text (empty for media without caption).
    fn text(&self) -> &str;

    /// Whether the logged-in account sent this message.
    fn outgoing(&self) -> bool;

    /// Replies to this message in the same chat.
    async fn reply(&self, text: &str) -> Result<(), TelegramError>;
}

/// Stream of incoming messages for one identity.
pub type MessageStream = mpsc::Receiver<Box<dyn InboundMessage>>;

/// Result of a successful connection.
pub struct Connection {
    pub me: SelfInfo,
    pub messages: MessageStream,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("me", &self.me)
            .finish_non_exhaustive()
    }
}

/// Protocol operations a client identity relies on.
#[async_trait]
pub trait TelegramBackend: Send + Sync {
    /// Connects and authenticates.
    ///
    /// An unusable session string must surface as
    /// [`TelegramError::InvalidSession`].
    async fn connect(&self, auth: &AuthMethod) -> Result<Connection, TelegramError>;

    /// Fetches the logged-in account.
    async fn get_me(&self) -> Result<SelfInfo, TelegramError>;

    /// Sends a text message to a chat given its Bot API style id.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    /// Whether a connection is currently open.
    fn is_connected(&self) -> bool;

    /// Closes the connection. Does nothing when not connected.
    async fn disconnect(&self);
}
