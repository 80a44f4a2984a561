//! JSON hub protocol: framing, handshake, and message model.
//!
//! Every record is a JSON object followed by the ASCII record separator
//! (`0x1E`). A single transport payload may carry several records.

use serde_json::Value;

use crate::error::ClientError;

use super::dto::hub::{HandshakeRequest, HandshakeResponse, HubFrame};

pub const RECORD_SEPARATOR: char = '\u{1e}';
pub const PROTOCOL_NAME: &str = "json";
pub const PROTOCOL_VERSION: u32 = 1;

/// Hub protocol messages the client understands
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Call of a method on the other side. Without an id no completion is expected.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// A frame of a type this client does not handle (streaming etc.)
    Unsupported(u8),
}

impl HubMessage {
    pub fn invocation(invocation_id: Option<String>, target: &str, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id,
            target: target.to_string(),
            arguments,
        }
    }
}

/// Encode one message as a complete record.
pub fn write_message(message: &HubMessage) -> Result<String, ClientError> {
    let frame = HubFrame::try_from(message.clone())?;
    let mut record = serde_json::to_string(&frame)?;
    record.push(RECORD_SEPARATOR);
    Ok(record)
}

/// Decode every record contained in a transport payload.
///
/// Each record is decoded on its own, so one malformed record does not hide
/// the others.
pub fn parse_messages(payload: &str) -> impl Iterator<Item = Result<HubMessage, ClientError>> + '_ {
    payload
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(|record| -> Result<HubMessage, ClientError> {
            let frame: HubFrame = serde_json::from_str(record)?;
            HubMessage::try_from(frame)
        })
}

/// Handshake record the client sends right after the transport opens.
pub fn handshake_request() -> Result<String, ClientError> {
    let request = HandshakeRequest {
        protocol: PROTOCOL_NAME.to_string(),
        version: PROTOCOL_VERSION,
    };
    let mut record = serde_json::to_string(&request)?;
    record.push(RECORD_SEPARATOR);
    Ok(record)
}

/// Check the server's handshake answer.
///
/// # Returns
///
/// The rest of the payload after the handshake record, which may already
/// contain hub messages
pub fn parse_handshake_response(payload: &str) -> Result<&str, ClientError> {
    let (record, rest) = payload.split_once(RECORD_SEPARATOR).ok_or_else(|| {
        ClientError::ConnectionEstablishment("incomplete handshake response".to_string())
    })?;

    let response: HandshakeResponse = serde_json::from_str(record).map_err(|e| {
        ClientError::ConnectionEstablishment(format!("invalid handshake response: {}", e))
    })?;

    match response.error {
        Some(error) => Err(ClientError::ConnectionEstablishment(format!(
            "hub rejected handshake: {}",
            error
        ))),
        None => Ok(rest),
    }
}
