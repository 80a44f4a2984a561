//! Domain entities.

use std::fmt;

use tokio::time::Instant;

use super::value_object::Timestamp;

/// Label shown instead of the local user's name on their own messages
pub const OWN_SENDER_LABEL: &str = "You";

/// A chat message as displayed by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Name the hub reported (or the local user's name for optimistic echoes)
    pub sender: String,
    pub body: String,
    /// When this client recorded the message
    pub received_at: Timestamp,
    /// Whether the message was sent by the local user
    pub is_own: bool,
}

impl ChatMessage {
    /// Sender label for display: "You" for own messages.
    pub fn display_sender(&self) -> &str {
        if self.is_own {
            OWN_SENDER_LABEL
        } else {
            &self.sender
        }
    }
}

/// A pending removal of a user from the active typing set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    pub user: String,
    pub expires_at: Instant,
}

/// Lifecycle of a hub connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// The connection could not be established
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting",
            Self::Failed => "Connection failed",
        };
        f.write_str(label)
    }
}
