//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the booking scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enable/disable the scheduler.
    /// When disabled, tasks can still be created and listed but never fire.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of concurrent booking workers. Bounds how many reservation
    /// attempts run at the same time.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long after its fire time a task may still be admitted for
    /// execution (milliseconds). Past this, the booking window is
    /// considered missed.
    #[serde(default = "default_admission_delay")]
    pub max_admission_delay_ms: u64,

    /// Maximum booking attempts per task, counting the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between retries (milliseconds). Doubled per attempt.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on the retry delay (milliseconds).
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Timeout for a single booking attempt (seconds).
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_worker_count() -> usize {
    4
}

fn default_admission_delay() -> u64 {
    2000 // 2 seconds
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    5000
}

fn default_attempt_timeout() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            worker_count: default_worker_count(),
            max_admission_delay_ms: default_admission_delay(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}
