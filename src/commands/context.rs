//! What a command handler gets to work with.

use std::fmt;
use std::sync::Arc;

use super::ParsedCommand;
use crate::client::BotClient;
use crate::telegram::{InboundMessage, TelegramError};

/// Invocation of a command.
#[derive(Clone)]
pub struct CommandContext {
    /// Client the command arrived on.
    pub client: Arc<BotClient>,
    /// Message that triggered the command.
    pub message: Arc<dyn InboundMessage>,
    pub command: ParsedCommand,
    /// Whether the sender may run privileged commands.
    pub is_sudo: bool,
}

impl CommandContext {
    /// Replies in the message's chat, splitting long text into several
    /// messages of at most `MAX_MESSAGE_LENGTH` characters.
    ///
    /// # Errors
    ///
    /// Returns the first send failure.
    pub async fn reply(&self, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, self.client.config().max_message_length) {
            self.message.reply(chunk).await?;
        }
        Ok(())
    }

    /// Replies with a refusal unless the sender is sudo. Returns whether the
    /// command may proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if the refusal cannot be sent.
    pub async fn require_sudo(&self) -> Result<bool, TelegramError> {
        if !self.is_sudo {
            self.reply("⛔ This command is restricted to sudo users.").await?;
        }
        Ok(self.is_sudo)
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("identity", &self.client.identity())
            .field("chat_id", &self.message.chat_id())
            .field("command", &self.command)
            .field("is_sudo", &self.is_sudo)
            .finish_non_exhaustive()
    }
}

/// Splits text into chunks of at most `max_chars` characters, preferring to
/// break after a newline. Never splits inside a character.
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the `max_chars`-th character
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(idx, _)| idx);
        let end = rest[..hard_end]
            .rfind('\n')
            .map_or(hard_end, |idx| idx + 1)
            .max(1);
        let end = if rest.is_char_boundary(end) { end } else { hard_end };

        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}
