//! PostgreSQL-backed membership store.

mod client;
mod migration;
mod store;

pub use client::DurableClient;
pub use migration::run_migrations;
pub use store::DurableMembershipStore;
