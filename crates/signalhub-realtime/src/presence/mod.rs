//! Presence broadcast — ordered notification plans executed per room.

pub mod notifier;
pub mod plan;

pub use notifier::PresenceNotifier;
pub use plan::{DepartureKind, NotificationPlan, Stage};
