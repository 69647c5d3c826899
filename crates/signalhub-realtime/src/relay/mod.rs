//! Point-to-point relay of negotiation messages.

pub mod signaling;

pub use signaling::SignalingRelay;
