//! # signalhub-auth
//!
//! Connection authentication for SignalHub.
//!
//! ## Modules
//!
//! - `jwt` — HS256 token claims, verification and issuance
//! - `profile` — in-memory profile directory seeded from verified tokens

pub mod jwt;
pub mod profile;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use profile::InMemoryProfileDirectory;
