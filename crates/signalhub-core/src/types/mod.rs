//! Core type definitions used across the SignalHub workspace.

pub mod id;
pub mod participant;

pub use id::*;
pub use participant::{Capabilities, MemberView, MembershipSnapshot, Participant, Profile};
