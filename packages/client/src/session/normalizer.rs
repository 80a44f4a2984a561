//! Normalization of inbound hub events into domain records.

use serde_json::Value;

use crate::{
    config::EchoMode,
    domain::{ChatMessage, Timestamp, hub_api},
    error::ClientError,
};

/// Inbound hub event with its arguments decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    MessageReceived { sender: String, body: String },
    UserTyping { user: String },
    /// The connection came back on a new transport after a drop
    Reconnected,
}

pub struct EventNormalizer;

impl EventNormalizer {
    /// Decode `ReceiveMessage(sender, message)`.
    pub fn message_received(arguments: &[Value]) -> Result<HubEvent, ClientError> {
        match arguments {
            [sender, body, ..] => Ok(HubEvent::MessageReceived {
                sender: string_argument(hub_api::RECEIVE_MESSAGE, "sender", sender)?,
                body: string_argument(hub_api::RECEIVE_MESSAGE, "message", body)?,
            }),
            _ => Err(arity_error(hub_api::RECEIVE_MESSAGE, 2, arguments.len())),
        }
    }

    /// Decode `UserTyping(typingUser)`.
    pub fn user_typing(arguments: &[Value]) -> Result<HubEvent, ClientError> {
        match arguments {
            [user, ..] => Ok(HubEvent::UserTyping {
                user: string_argument(hub_api::USER_TYPING, "typingUser", user)?,
            }),
            _ => Err(arity_error(hub_api::USER_TYPING, 1, arguments.len())),
        }
    }

    /// Turn a received message into the record to append.
    ///
    /// # Arguments
    ///
    /// * `local_user` - The session's user name, `None` while unset
    ///
    /// # Returns
    ///
    /// `None` when the message is the hub's echo of a send this client
    /// already recorded locally
    pub fn normalize_message(
        sender: String,
        body: String,
        local_user: Option<&str>,
        echo_mode: EchoMode,
        received_at: Timestamp,
    ) -> Option<ChatMessage> {
        let is_own = local_user == Some(sender.as_str());
        if is_own && echo_mode == EchoMode::Optimistic {
            return None;
        }
        Some(ChatMessage {
            sender,
            body,
            received_at,
            is_own,
        })
    }
}

fn string_argument(target: &str, name: &str, value: &Value) -> Result<String, ClientError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ClientError::Protocol(format!(
            "'{}' argument '{}' must be a string, got {}",
            target, name, value
        ))
    })
}

fn arity_error(target: &str, expected: usize, actual: usize) -> ClientError {
    ClientError::Protocol(format!(
        "'{}' expects {} argument(s), got {}",
        target, expected, actual
    ))
}
