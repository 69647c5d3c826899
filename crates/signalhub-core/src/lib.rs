//! # signalhub-core
//!
//! Core crate for SignalHub. Contains the membership traits, configuration
//! schemas, typed identifiers, the participant model, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other SignalHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
