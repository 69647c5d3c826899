//! JSON serialization for WebSocket messages.

use signalhub_core::error::AppError;

use super::envelope::InboundEnvelope;
use super::types::{InboundMessage, OutboundMessage};
use super::validator::validate_inbound;

/// Serialize an outbound message to a text frame.
pub fn serialize_outbound(msg: &OutboundMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Validate and decode an inbound text frame.
pub fn deserialize_inbound(
    text: &str,
    max_message_bytes: usize,
    max_payload_bytes: usize,
) -> Result<InboundMessage, AppError> {
    validate_inbound(text, max_message_bytes)?;
    InboundEnvelope::parse(text)?.into_message(max_payload_bytes)
}
