//! Auto-booking task model and storage.

mod fire_time;
mod sqlite_store;
mod store;
mod types;

pub use fire_time::fire_time_for;
pub use sqlite_store::SqliteTaskStore;
pub use store::{CreateTaskRequest, TaskError, TaskFilter, TaskStore};
pub use types::{AutoBookingTask, FailureReason, TaskState};
