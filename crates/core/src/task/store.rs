//! Task storage trait and types.

use chrono::NaiveDate;
use thiserror::Error;

use super::{AutoBookingTask, TaskState};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// The stored state did not match the expected one; a racing cancel
    /// or duplicate trigger was detected rather than silently overwritten.
    #[error("cannot {operation} task {task_id}: current state is {current_state}")]
    Conflict {
        task_id: String,
        current_state: String,
        operation: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new auto-booking task.
///
/// `fire_time` is never part of the request; the store derives it from
/// `target_date`.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    /// Venue to book.
    pub venue_id: String,
    /// Account whose credentials will be used. Required and explicit;
    /// default-account selection is a client-side concern.
    pub account_id: String,
    /// Date being reserved.
    pub target_date: NaiveDate,
    /// Slot descriptor, e.g. "08:00-10:00".
    pub time_slot: String,
}

/// Filter for querying tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Filter by state type.
    pub state: Option<String>,
    /// Filter by account.
    pub account_id: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            state: None,
            account_id: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by state type.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Filter by account.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for task storage backends.
///
/// The store is the single source of truth and the only shared mutable
/// resource in the engine; all mutation goes through the optimistic
/// `transition` contract, so no two components ever apply conflicting
/// writes without one of them observing a `Conflict`.
pub trait TaskStore: Send + Sync {
    /// Create a new task in the Pending state with a derived fire time.
    fn create(&self, request: CreateTaskRequest) -> Result<AutoBookingTask, TaskError>;

    /// Get a task by ID.
    fn get(&self, id: &str) -> Result<Option<AutoBookingTask>, TaskError>;

    /// List tasks matching the filter, ordered by fire time ascending.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<AutoBookingTask>, TaskError>;

    /// Count tasks matching the filter.
    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError>;

    /// Cancel a task. Succeeds only while the task is Pending; otherwise
    /// fails with `Conflict` (or `NotFound`).
    fn cancel(&self, id: &str) -> Result<AutoBookingTask, TaskError>;

    /// Atomically apply a state transition iff the stored state type
    /// equals `from`, bumping the version. A mismatch yields `Conflict`.
    fn transition(
        &self,
        id: &str,
        from: &str,
        to: TaskState,
    ) -> Result<AutoBookingTask, TaskError>;

    /// Atomically increment the attempt counter. Persisted before the
    /// booking call is issued so a crash mid-call is detectable.
    fn record_attempt(&self, id: &str) -> Result<AutoBookingTask, TaskError>;
}
