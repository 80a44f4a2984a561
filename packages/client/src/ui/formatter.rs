//! Message formatting utilities for the terminal view.

use hubchat_shared::time::timestamp_to_local_time;

use crate::{
    domain::{ChatMessage, ConnectionState},
    session::SessionSnapshot,
};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display; own messages are labeled "You"
    ///
    /// # Returns
    ///
    /// A formatted line with the local receive time, sender, and body
    pub fn format_chat_message(message: &ChatMessage) -> String {
        format!(
            "[{}] {}: {}\n",
            timestamp_to_local_time(message.received_at.value()),
            message.display_sender(),
            message.body
        )
    }

    /// Format a status line
    pub fn format_status(status: &str) -> String {
        format!("* {}\n", status)
    }

    /// Format the typing banner
    ///
    /// # Returns
    ///
    /// `None` when nobody is typing
    pub fn format_typing(users: &[String]) -> Option<String> {
        match users {
            [] => None,
            [user] => Some(format!("{} is typing...\n", user)),
            users => Some(format!("{} are typing...\n", users.join(", "))),
        }
    }

    pub fn format_connection_state(state: ConnectionState) -> String {
        format!("-- {} --\n", state)
    }
}

/// Renders the difference between consecutive session snapshots
#[derive(Debug, Default)]
pub struct ViewRenderer {
    last: SessionSnapshot,
}

impl ViewRenderer {
    pub fn new(initial: SessionSnapshot) -> Self {
        Self { last: initial }
    }

    /// Render everything that changed since the previous call.
    ///
    /// # Returns
    ///
    /// The text to print; empty when nothing visible changed
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> String {
        let mut output = String::new();

        if snapshot.connection_state != self.last.connection_state {
            output.push_str(&MessageFormatter::format_connection_state(
                snapshot.connection_state,
            ));
        }

        // Messages are append-only
        if let Some(new_messages) = snapshot.messages.get(self.last.messages.len()..) {
            for message in new_messages {
                output.push_str(&MessageFormatter::format_chat_message(message));
            }
        }

        if snapshot.status_message != self.last.status_message
            && let Some(status) = &snapshot.status_message
        {
            output.push_str(&MessageFormatter::format_status(status));
        }

        if snapshot.typing_users != self.last.typing_users
            && let Some(banner) = MessageFormatter::format_typing(&snapshot.typing_users)
        {
            output.push_str(&banner);
        }

        self.last = snapshot.clone();
        output
    }
}
