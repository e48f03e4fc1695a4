use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Reminder message length cap, in characters (not bytes).
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Listing page size when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: usize = 50;
/// Hard cap on a single listing page.
pub const MAX_PAGE_LIMIT: usize = 100;
/// Due-reminder batch size per tick when not configured.
pub const DEFAULT_DUE_BATCH_LIMIT: usize = 200;
/// Absolute ceiling on the due batch — guards work spikes after downtime.
pub const MAX_DUE_BATCH_LIMIT: usize = 5000;
/// Scheduler polling cadence.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
/// Dispatch marks older than this are purged regardless of outcome.
pub const DEFAULT_MARK_RETENTION_DAYS: i64 = 14;

/// Top-level config (remindd.toml + REMINDD_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminddConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ReminddConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Scheduler tunables. All have safe defaults; the batch limit is clamped
/// so an operator typo cannot turn a tick into an unbounded scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_due_batch_limit")]
    pub due_batch_limit: usize,
    #[serde(default = "default_mark_retention_days")]
    pub mark_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            due_batch_limit: default_due_batch_limit(),
            mark_retention_days: default_mark_retention_days(),
        }
    }
}

impl SchedulerConfig {
    /// Batch limit with the operator value clamped into 1..=MAX.
    pub fn effective_batch_limit(&self) -> usize {
        if self.due_batch_limit == 0 {
            DEFAULT_DUE_BATCH_LIMIT
        } else {
            self.due_batch_limit.min(MAX_DUE_BATCH_LIMIT)
        }
    }
}

impl ReminddConfig {
    /// Load from `remindd.toml` (or an explicit path) with `REMINDD_*`
    /// environment overrides, e.g. `REMINDD_SCHEDULER__DUE_BATCH_LIMIT=500`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("remindd.toml");
        let config: ReminddConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("REMINDD_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        tracing::debug!(
            path,
            tick_interval_secs = config.scheduler.tick_interval_secs,
            due_batch_limit = config.scheduler.due_batch_limit,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn default_db_path() -> String {
    "data/remindd.db".to_string()
}

fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}

fn default_due_batch_limit() -> usize {
    DEFAULT_DUE_BATCH_LIMIT
}

fn default_mark_retention_days() -> i64 {
    DEFAULT_MARK_RETENTION_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = ReminddConfig::default();
        assert_eq!(cfg.scheduler.tick_interval_secs, 30);
        assert_eq!(cfg.scheduler.due_batch_limit, 200);
        assert_eq!(cfg.scheduler.mark_retention_days, 14);
    }

    #[test]
    fn batch_limit_zero_falls_back_to_default() {
        let cfg = SchedulerConfig {
            due_batch_limit: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.effective_batch_limit(), DEFAULT_DUE_BATCH_LIMIT);
    }

    #[test]
    fn batch_limit_clamped_to_hard_cap() {
        let cfg = SchedulerConfig {
            due_batch_limit: 1_000_000,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.effective_batch_limit(), MAX_DUE_BATCH_LIMIT);
    }
}
