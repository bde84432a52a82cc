//! Wire protocol
//!
//! Every request is a JSON object tagged by its `command` field. Only the two
//! commands below exist; any other value fails to decode and the connection
//! that sent it is closed.
//!
//! Delivered payloads are not wrapped: a subscriber receives the publisher's
//! `data` object exactly as it was encoded here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::error::CodecError;

/// The `data` object carried by a publish request.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Subscribe {
        topic: String,
    },

    Publish {
        topic: String,
        #[serde(default)]
        data: Payload,
    },
}

impl Command {
    pub fn topic(&self) -> &str {
        match self {
            Command::Subscribe { topic } | Command::Publish { topic, .. } => topic,
        }
    }
}

/// Decodes one frame into a [`Command`].
pub fn decode(frame: &str) -> Result<Command, CodecError> {
    Ok(serde_json::from_str(frame)?)
}

/// Decodes a frame that arrived as raw bytes, e.g. a binary WebSocket message.
pub fn decode_bytes(frame: &[u8]) -> Result<Command, CodecError> {
    let text = std::str::from_utf8(frame).map_err(|_| CodecError::NotUtf8)?;
    decode(text)
}

/// Encodes a publish payload once so every subscriber can share the same
/// buffer.
pub fn encode_payload(data: &Payload) -> Result<Arc<str>, CodecError> {
    Ok(serde_json::to_string(data)?.into())
}

pub fn encode_command(command: &Command) -> Result<String, CodecError> {
    Ok(serde_json::to_string(command)?)
}

/// Parses a delivered payload on the subscriber side.
pub fn decode_payload(frame: &str) -> Result<Payload, CodecError> {
    Ok(serde_json::from_str(frame)?)
}
