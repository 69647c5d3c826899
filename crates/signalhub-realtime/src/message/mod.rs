//! WebSocket message types, serialization, and validation.

pub mod envelope;
pub mod payload;
pub mod serializer;
pub mod types;
pub mod validator;

pub use envelope::InboundEnvelope;
pub use payload::SignalPayload;
pub use types::{
    InboundMessage, MembershipAction, OutboundMessage, RelayedSignal, SenderInfo, SignalKind,
};
