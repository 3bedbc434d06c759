//! # khidma-core
//!
//! Shared foundation for the Khidma presence subsystem: the unified
//! error type, the `AppResult` alias, and the configuration schemas
//! loaded from TOML.

pub mod config;
pub mod error;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
