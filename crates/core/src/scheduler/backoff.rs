//! Retry delay computation.

use std::time::Duration;

use rand::Rng;

use super::SchedulerConfig;

/// Delay to wait after `completed_attempts` failed attempts.
///
/// Exponential with a bounded additive jitter: `base * 2^(n-1) * (1 + j)`
/// with `j` in `[0, 0.5)`. The jitter spreads out concurrent retries
/// without ever making a later delay shorter than an earlier one, until
/// both hit the configured cap.
pub(crate) fn retry_delay(config: &SchedulerConfig, completed_attempts: u32) -> Duration {
    let exp = completed_attempts.saturating_sub(1).min(16);
    let base = config.retry_base_delay_ms.saturating_mul(1u64 << exp);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..0.5);
    let delayed = (base as f64 * (1.0 + jitter)) as u64;
    Duration::from_millis(delayed.min(config.retry_max_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_ms: u64, max_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            retry_base_delay_ms: base_ms,
            retry_max_delay_ms: max_ms,
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_delays_increase_despite_jitter() {
        // Max jitter on attempt n (1.5 * base * 2^(n-1)) stays below the
        // min on attempt n+1 (base * 2^n), so ordering is deterministic.
        let config = config(100, 1_000_000);
        for _ in 0..50 {
            let d1 = retry_delay(&config, 1);
            let d2 = retry_delay(&config, 2);
            let d3 = retry_delay(&config, 3);
            assert!(d1 < d2, "{:?} >= {:?}", d1, d2);
            assert!(d2 < d3, "{:?} >= {:?}", d2, d3);
        }
    }

    #[test]
    fn test_delay_respects_cap() {
        let config = config(1000, 2500);
        for completed in 1..10 {
            assert!(retry_delay(&config, completed) <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_first_retry_uses_base_delay() {
        let config = config(200, 1_000_000);
        let d = retry_delay(&config, 1);
        assert!(d >= Duration::from_millis(200));
        assert!(d < Duration::from_millis(300));
    }

    #[test]
    fn test_large_attempt_count_does_not_overflow() {
        let config = config(u64::MAX / 2, 5000);
        assert!(retry_delay(&config, 1000) <= Duration::from_millis(5000));
    }
}
