//! Conversion logic between hub frames and protocol messages.

use crate::error::ClientError;
use crate::infrastructure::protocol::HubMessage;

use super::hub::{HubFrame, message_type};

// ========================================
// DTO → Protocol message
// ========================================

impl TryFrom<HubFrame> for HubMessage {
    type Error = ClientError;

    fn try_from(frame: HubFrame) -> Result<Self, Self::Error> {
        match frame.r#type {
            message_type::INVOCATION => {
                let target = frame.target.ok_or_else(|| {
                    ClientError::Protocol("invocation without a target".to_string())
                })?;
                Ok(Self::Invocation {
                    invocation_id: frame.invocation_id,
                    target,
                    arguments: frame.arguments.unwrap_or_default(),
                })
            }
            message_type::COMPLETION => {
                let invocation_id = frame.invocation_id.ok_or_else(|| {
                    ClientError::Protocol("completion without an invocation id".to_string())
                })?;
                Ok(Self::Completion {
                    invocation_id,
                    result: frame.result,
                    error: frame.error,
                })
            }
            message_type::PING => Ok(Self::Ping),
            message_type::CLOSE => Ok(Self::Close {
                error: frame.error,
                allow_reconnect: frame.allow_reconnect.unwrap_or(false),
            }),
            other => Ok(Self::Unsupported(other)),
        }
    }
}

// ========================================
// Protocol message → DTO
// ========================================

impl TryFrom<HubMessage> for HubFrame {
    type Error = ClientError;

    fn try_from(message: HubMessage) -> Result<Self, Self::Error> {
        let frame = match message {
            HubMessage::Invocation {
                invocation_id,
                target,
                arguments,
            } => Self {
                r#type: message_type::INVOCATION,
                invocation_id,
                target: Some(target),
                arguments: Some(arguments),
                ..Default::default()
            },
            HubMessage::Completion {
                invocation_id,
                result,
                error,
            } => Self {
                r#type: message_type::COMPLETION,
                invocation_id: Some(invocation_id),
                result,
                error,
                ..Default::default()
            },
            HubMessage::Ping => Self {
                r#type: message_type::PING,
                ..Default::default()
            },
            HubMessage::Close {
                error,
                allow_reconnect,
            } => Self {
                r#type: message_type::CLOSE,
                error,
                allow_reconnect: Some(allow_reconnect),
                ..Default::default()
            },
            HubMessage::Unsupported(r#type) => {
                return Err(ClientError::Protocol(format!(
                    "cannot encode unsupported message type {}",
                    r#type
                )));
            }
        };
        Ok(frame)
    }
}
