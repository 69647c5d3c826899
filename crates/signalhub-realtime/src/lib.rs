//! # signalhub-realtime
//!
//! Signaling engine for SignalHub. Provides:
//!
//! - WebSocket connection management with JWT authentication
//! - Room membership with single-room residency
//! - Ordered, paced presence broadcast per room
//! - Point-to-point relay of offers, answers and ICE candidates
//! - Liveness sweeps that reclaim silent participants

pub mod connection;
pub mod liveness;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod relay;
pub mod room;
pub mod server;

pub use connection::{ConnectionManager, WsAuthenticator};
pub use liveness::LivenessMonitor;
pub use presence::PresenceNotifier;
pub use relay::SignalingRelay;
pub use room::{DisconnectPolicy, RoomManager};
pub use server::SignalingEngine;
