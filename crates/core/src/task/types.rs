//! Core auto-booking task data types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingConfirmation;

/// Why a task reached the `Failed` state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Credential resolution failed - will not self-resolve, never retried.
    CredentialError,
    /// The booking provider rejected the credentials.
    AuthError,
    /// The slot was already taken - expected contention, not a fault.
    SlotTaken,
    /// All transient retries were used up.
    RetriesExhausted,
    /// Admission latency exceeded the jitter tolerance; a stale attempt
    /// was refused rather than executed late.
    SchedulingMissedWindow,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::CredentialError => write!(f, "credential_error"),
            FailureReason::AuthError => write!(f, "auth_error"),
            FailureReason::SlotTaken => write!(f, "slot_taken"),
            FailureReason::RetriesExhausted => write!(f, "retries_exhausted"),
            FailureReason::SchedulingMissedWindow => write!(f, "scheduling_missed_window"),
        }
    }
}

/// Current state of an auto-booking task.
///
/// State machine flow:
/// ```text
/// Pending -> Triggered -> Succeeded | Failed
///    |
///    v
/// Cancelled
/// ```
///
/// Transitions are monotonic: terminal states never re-enter a
/// non-terminal one, and cancellation is accepted only while Pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskState {
    /// Task created, waiting for its fire time.
    Pending,

    /// Fire time reached; the task has been handed to the dispatcher.
    Triggered {
        triggered_at: DateTime<Utc>,
        /// True when the fire time elapsed while the engine was down and
        /// the task was triggered on a best-effort basis at startup.
        missed_window: bool,
    },

    /// A booking attempt succeeded (terminal).
    Succeeded {
        confirmation: BookingConfirmation,
        executed_at: DateTime<Utc>,
        #[serde(default)]
        missed_window: bool,
    },

    /// The task failed (terminal).
    Failed {
        reason: FailureReason,
        /// Last error observed, for the task record.
        error: String,
        failed_at: DateTime<Utc>,
        #[serde(default)]
        missed_window: bool,
    },

    /// Cancelled by the user while still Pending (terminal).
    Cancelled { cancelled_at: DateTime<Utc> },
}

impl TaskState {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded { .. } | TaskState::Failed { .. } | TaskState::Cancelled { .. }
        )
    }

    /// Returns true if the task can be cancelled from this state.
    ///
    /// Only Pending tasks are cancellable: once Triggered an attempt may
    /// already be in flight and cannot be safely aborted mid-call.
    pub fn can_cancel(&self) -> bool {
        matches!(self, TaskState::Pending)
    }

    /// Returns the missed-window flag if recorded on this state.
    pub fn missed_window(&self) -> bool {
        match self {
            TaskState::Triggered { missed_window, .. }
            | TaskState::Succeeded { missed_window, .. }
            | TaskState::Failed { missed_window, .. } => *missed_window,
            _ => false,
        }
    }

    /// Returns the state type as a string (for filtering).
    pub fn state_type(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Triggered { .. } => "triggered",
            TaskState::Succeeded { .. } => "succeeded",
            TaskState::Failed { .. } => "failed",
            TaskState::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns the failure reason if the task is Failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            TaskState::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// An auto-booking task: one reservation attempt to be fired at a
/// deterministic instant on behalf of a stored account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoBookingTask {
    /// Unique identifier (UUID).
    pub id: String,

    /// Venue the attempt targets. Opaque to the engine; existence is the
    /// creator's responsibility.
    pub venue_id: String,

    /// Account whose credentials will be used. A missing credential at
    /// execution time is a terminal error.
    pub account_id: String,

    /// The date being reserved.
    pub target_date: NaiveDate,

    /// Slot descriptor, e.g. "08:00-10:00".
    pub time_slot: String,

    /// The instant the task becomes eligible for execution. Derived from
    /// `target_date`, never supplied by the caller.
    pub fire_time: DateTime<Utc>,

    /// Current state.
    pub state: TaskState,

    /// Booking attempts made so far. The increment is persisted before
    /// each call so a crash mid-call is detectable.
    pub attempts: u32,

    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
