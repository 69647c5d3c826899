//! Core traits defined in `signalhub-core` and implemented by other crates.

pub mod membership;
pub mod profile;

pub use membership::{
    Admission, AdmissionKind, Departure, MembershipStore, RemovalCondition, StoreMode,
};
pub use profile::ProfileDirectory;
