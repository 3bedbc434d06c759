//! Maintenance scheduler configuration.

use serde::{Deserialize, Serialize};

/// Cadences for the periodic maintenance tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the maintenance scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Session sweep interval in minutes.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u32,
    /// Metrics snapshot interval in minutes.
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_minutes: u32,
    /// Stale-session hard purge interval in hours.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_hours: u32,
    /// Health check interval in minutes.
    #[serde(default = "default_health_interval")]
    pub health_interval_minutes: u32,
    /// Metrics integrity validation interval in days.
    #[serde(default = "default_integrity_interval")]
    pub integrity_interval_days: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_minutes: default_sweep_interval(),
            metrics_interval_minutes: default_metrics_interval(),
            purge_interval_hours: default_purge_interval(),
            health_interval_minutes: default_health_interval(),
            integrity_interval_days: default_integrity_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u32 {
    2
}

fn default_metrics_interval() -> u32 {
    5
}

fn default_purge_interval() -> u32 {
    24
}

fn default_health_interval() -> u32 {
    30
}

fn default_integrity_interval() -> u32 {
    7
}
