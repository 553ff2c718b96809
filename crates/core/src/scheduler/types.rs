//! Types for the booking scheduler.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::TaskError;

/// Errors that can occur during scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] TaskError),

    /// The scheduler was started once already; restart is not supported.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// The scheduler is not running.
    #[error("scheduler is not running")]
    NotRunning,
}

/// Commands sent to the trigger clock to keep its due-set in sync with
/// the store.
#[derive(Debug, Clone)]
pub enum ClockCommand {
    /// A task was created; register its fire time.
    Insert {
        id: String,
        fire_time: DateTime<Utc>,
    },
    /// A task was cancelled; forget its fire time.
    Remove { id: String },
}

/// A task whose fire time has arrived, handed from clock to dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    /// Task ID.
    pub id: String,
    /// The moment the task was supposed to fire.
    pub fire_time: DateTime<Utc>,
    /// When the clock actually fired it.
    pub triggered_at: DateTime<Utc>,
    /// True when the clock fired the task well past its fire time,
    /// e.g. after a restart with past-due tasks in the store.
    pub missed_window: bool,
}

// Earlier fire time first; ids break ties so the order is total.
impl Ord for DueTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_time
            .cmp(&other.fire_time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for DueTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Current status of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the scheduler is running.
    pub running: bool,
    /// Booking attempts currently in flight.
    pub in_flight: usize,
    /// Size of the worker pool.
    pub worker_count: usize,
    /// Tasks waiting for their fire time.
    pub pending_count: usize,
    /// Tasks fired but not yet resolved.
    pub triggered_count: usize,
    /// Tasks that secured a reservation.
    pub succeeded_count: usize,
    /// Tasks that failed terminally.
    pub failed_count: usize,
    /// Tasks cancelled before firing.
    pub cancelled_count: usize,
}
