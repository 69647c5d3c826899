//! Opaque negotiation payloads.

use serde::Serialize;
use serde_json::value::RawValue;

use signalhub_core::error::AppError;

/// A session description or ICE candidate, kept as the exact JSON text the
/// sender supplied. The relay never looks inside.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct SignalPayload(Box<RawValue>);

impl SignalPayload {
    /// Accept a raw payload no longer than `max_bytes`.
    pub fn new(raw: Box<RawValue>, max_bytes: usize) -> Result<Self, AppError> {
        let len = raw.get().len();
        if len > max_bytes {
            return Err(AppError::validation(format!(
                "payload exceeds maximum size of {max_bytes} bytes ({len} bytes)"
            )));
        }
        Ok(Self(raw))
    }

    /// The payload as JSON text.
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Length of the JSON text in bytes.
    pub fn len(&self) -> usize {
        self.0.get().len()
    }

    /// Whether the payload is empty JSON text.
    pub fn is_empty(&self) -> bool {
        self.0.get().is_empty()
    }
}
