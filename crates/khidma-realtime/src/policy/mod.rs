//! Presence policy engine.

pub mod engine;

pub use engine::{project, LAST_SEEN_RECENTLY};
