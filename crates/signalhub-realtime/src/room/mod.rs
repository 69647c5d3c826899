//! Room membership orchestration.

pub mod manager;

pub use manager::{DisconnectPolicy, RoomManager};
