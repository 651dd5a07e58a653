//! Client lifecycle state.

use std::fmt;
use std::time::Duration;

use super::ClientError;

/// Lifecycle of one client identity.
///
/// ```text
/// Uninitialized -> Starting -> Running -> Stopping -> Stopped
///                     |                                  |
///                     +---- (failed start) -> Stopped    +-> Starting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Uninitialized,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ClientState {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized | Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running | Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Returns `next` if the move is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] for an illegal move.
    pub fn transition(self, next: Self) -> Result<Self, ClientError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ClientError::InvalidState {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Formats an uptime as `Xd Xh Xm Xs`, dropping leading zero units.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
