use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scheduler worker count and attempt budget are at least 1
/// - Retry delays are consistent
/// - Booking base URL is not empty when configured
/// - Account ids are non-empty and unique
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Scheduler validation
    if config.scheduler.worker_count == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.worker_count must be at least 1".to_string(),
        ));
    }
    if config.scheduler.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.scheduler.retry_base_delay_ms > config.scheduler.retry_max_delay_ms {
        return Err(ConfigError::ValidationError(
            "scheduler.retry_base_delay_ms cannot exceed scheduler.retry_max_delay_ms".to_string(),
        ));
    }

    // Booking validation
    if let Some(booking) = &config.booking {
        if booking.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "booking.base_url cannot be empty".to_string(),
            ));
        }
    }

    // Account validation
    let mut seen = HashSet::new();
    for account in &config.accounts {
        if account.id.is_empty() {
            return Err(ConfigError::ValidationError(
                "accounts entries must have a non-empty id".to_string(),
            ));
        }
        if !seen.insert(account.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate account id: {}",
                account.id
            )));
        }
    }

    Ok(())
}
