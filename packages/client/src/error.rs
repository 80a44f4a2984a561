//! Error types for the chat client.

use thiserror::Error;

use crate::domain::ValidationError;

/// Client-specific errors
///
/// Every variant is handled inside the session and surfaced to the user as a
/// status line; callers get the error back only for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The transport or the protocol handshake could not be established
    #[error("Connection error: {0}")]
    ConnectionEstablishment(String),

    /// An invocation was attempted while the connection is not connected
    #[error("Cannot invoke a hub method while the connection is not connected")]
    NotConnected,

    /// The connection went away before the invocation completed
    #[error("Invocation '{0}' canceled because the connection was closed")]
    ConnectionLost(String),

    /// The hub answered the invocation with an error
    #[error("Hub rejected '{target}': {message}")]
    InvocationRejected { target: String, message: String },

    /// User input failed validation; nothing was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A frame could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Protocol(error.to_string())
    }
}
