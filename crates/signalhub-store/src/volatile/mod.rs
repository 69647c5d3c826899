//! In-process membership store backed by concurrent maps.

mod store;

pub use store::VolatileMembershipStore;
