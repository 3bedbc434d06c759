//! Result alias used across all Khidma crates.

use crate::error::AppError;

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
