//! Conversion between Bot API style chat ids and MTProto peers.
//!
//! Configuration and command handlers use Bot API ids: users are positive,
//! basic groups are negated, and channels/supergroups are `-100` followed by
//! the channel id.

use std::fmt;

const CHANNEL_OFFSET: i64 = 1_000_000_000_000;

/// A chat id split by peer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerKind {
    User(i64),
    Chat(i64),
    Channel(i64),
}

impl PeerKind {
    /// Splits a Bot API style id.
    #[must_use]
    pub const fn from_bot_api(id: i64) -> Self {
        if id > 0 {
            Self::User(id)
        } else if id <= -CHANNEL_OFFSET {
            Self::Channel(-id - CHANNEL_OFFSET)
        } else {
            Self::Chat(-id)
        }
    }

    /// Joins back into a Bot API style id.
    #[must_use]
    pub const fn to_bot_api(self) -> i64 {
        match self {
            Self::User(id) => id,
            Self::Chat(id) => -id,
            Self::Channel(id) => -(id + CHANNEL_OFFSET),
        }
    }
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Chat(id) => write!(f, "chat {id}"),
            Self::Channel(id) => write!(f, "channel {id}"),
        }
    }
}
