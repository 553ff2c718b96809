pub mod booking;
pub mod config;
pub mod scheduler;
pub mod task;
pub mod testing;
pub mod vault;

pub use booking::{BookingClient, BookingConfirmation, BookingError, HttpBookingClient};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use scheduler::{
    BookingScheduler, SchedulerConfig, SchedulerError, SchedulerHandle, SchedulerStatus,
};
pub use task::{
    fire_time_for, AutoBookingTask, CreateTaskRequest, FailureReason, SqliteTaskStore, TaskError,
    TaskFilter, TaskState, TaskStore,
};
pub use vault::{CredentialVault, Credentials, StaticVault, VaultError};
