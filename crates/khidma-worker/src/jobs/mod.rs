//! Maintenance task implementations.

pub mod health;
pub mod integrity;
pub mod metrics;
pub mod purge;
pub mod repair;
pub mod sweep;

pub use health::HealthCheckTask;
pub use integrity::MetricsIntegrityTask;
pub use metrics::MetricsSnapshotTask;
pub use purge::SessionPurgeTask;
pub use repair::PresenceRepairTask;
pub use sweep::SessionSweepTask;

/// Task names as registered with the executor.
pub const SESSION_SWEEP: &str = "session_sweep";
pub const METRICS_SNAPSHOT: &str = "metrics_snapshot";
pub const SESSION_PURGE: &str = "session_purge";
pub const HEALTH_CHECK: &str = "health_check";
pub const METRICS_INTEGRITY: &str = "metrics_integrity";
pub const PRESENCE_REPAIR: &str = "presence_repair";
