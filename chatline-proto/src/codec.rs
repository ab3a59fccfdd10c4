//! Serialization and deserialization for the `Chatline` wire protocol.
//!
//! Messages travel as one JSON object per line. [`encode`] never emits a raw
//! newline (JSON escapes them inside strings), so the transport can frame
//! messages by line.

use crate::message::Message;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input is not a message with a recognized kind.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a [`Message`] as a single-line JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the message cannot be serialized.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`Message`] from one JSON line.
///
/// Payload contents are not validated; only the structure and the kind are.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the input is not JSON, lacks a
/// `typeMessage`, or names an unknown kind.
pub fn decode(line: &str) -> Result<Message, CodecError> {
    serde_json::from_str(line.trim()).map_err(|e| CodecError::Malformed(e.to_string()))
}
