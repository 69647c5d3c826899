//! # signalhub-store
//!
//! Membership store implementations for SignalHub. Supports two families:
//!
//! - **volatile**: In-process store using [dashmap](https://crates.io/crates/dashmap),
//!   reclaimed by the liveness sweep and lost on restart
//! - **durable**: PostgreSQL-backed store using [sqlx](https://crates.io/crates/sqlx),
//!   survives restart and is purged on startup
//!
//! The backend is selected at runtime based on configuration.

#[cfg(feature = "durable")]
pub mod durable;
pub mod provider;
#[cfg(feature = "volatile")]
pub mod volatile;

pub use provider::StoreManager;
