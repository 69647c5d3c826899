//! Convenience result type alias for SignalHub.

use crate::error::AppError;

/// A specialized `Result` type for SignalHub operations.
pub type AppResult<T> = Result<T, AppError>;
