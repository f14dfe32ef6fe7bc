use serde::Deserialize;
use std::time::Duration;

/// Worker pool and retry policy for queued check tasks.
///
/// This section is loaded from `[queue]` in `config.toml`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of workers draining the task queue.
    pub concurrency: usize,
    /// Attempts per task before it is terminally failed.
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent attempt.
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
    /// Interval between checking registered cron schedules for due jobs.
    #[serde(with = "humantime_serde")]
    pub cron_poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            cron_poll_interval: Duration::from_secs(15),
        }
    }
}
