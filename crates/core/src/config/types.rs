use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub booking: Option<BookingConfig>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("slotrush.db")
}

/// Booking provider configuration (required to start the scheduler)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingConfig {
    /// Provider base URL (e.g., "https://venues.example.com/api")
    pub base_url: String,
    /// Per-attempt request timeout in seconds (default: 10)
    #[serde(default = "default_booking_timeout")]
    pub timeout_secs: u64,
}

fn default_booking_timeout() -> u64 {
    10
}

/// One booking account, keyed by id from task requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub id: String,
    pub username: String,
    pub password: String,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking: Option<SanitizedBookingConfig>,
    pub accounts: Vec<SanitizedAccountConfig>,
}

/// Sanitized booking config
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBookingConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Sanitized account entry (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAccountConfig {
    pub id: String,
    pub username: String,
    pub password_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            scheduler: config.scheduler.clone(),
            booking: config.booking.as_ref().map(|b| SanitizedBookingConfig {
                base_url: b.base_url.clone(),
                timeout_secs: b.timeout_secs,
            }),
            accounts: config
                .accounts
                .iter()
                .map(|a| SanitizedAccountConfig {
                    id: a.id.clone(),
                    username: a.username.clone(),
                    password_configured: !a.password.is_empty(),
                })
                .collect(),
        }
    }
}
