//! # khidma-worker
//!
//! Scheduled maintenance for the presence subsystem: the stale-session
//! sweep, metrics snapshots, hard purge of old session rows, periodic
//! health checks, metrics integrity validation, and the manual
//! presence repair task.
//!
//! Tasks are registered with a [`TaskExecutor`] and driven by the
//! cron-based [`MaintenanceScheduler`]; any task can also be triggered
//! by hand through the executor.

pub mod executor;
pub mod jobs;
pub mod notifier;
pub mod scheduler;
pub mod snapshot;

pub use executor::{TaskExecutor, TaskHandler};
pub use notifier::PresenceNotifier;
pub use scheduler::MaintenanceScheduler;
pub use snapshot::{MetricsStore, PresenceMetrics};
