//! Task store decorator that injects failures, for recovery testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::task::{
    AutoBookingTask, CreateTaskRequest, TaskError, TaskFilter, TaskState, TaskStore,
};

/// Wraps a real store and fails a scripted number of upcoming calls,
/// so store-error recovery paths can be exercised deterministically.
pub struct FlakyTaskStore {
    inner: Arc<dyn TaskStore>,
    failing_transitions: AtomicUsize,
    failing_record_attempts: AtomicUsize,
}

impl FlakyTaskStore {
    /// Wrap a store. Until failures are scripted, every call delegates.
    pub fn new(inner: Arc<dyn TaskStore>) -> Self {
        Self {
            inner,
            failing_transitions: AtomicUsize::new(0),
            failing_record_attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` transition calls with a database error.
    pub fn fail_next_transitions(&self, count: usize) {
        self.failing_transitions.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` record_attempt calls with a database error.
    pub fn fail_next_record_attempts(&self, count: usize) {
        self.failing_record_attempts.store(count, Ordering::SeqCst);
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TaskStore for FlakyTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<AutoBookingTask, TaskError> {
        self.inner.create(request)
    }

    fn get(&self, id: &str) -> Result<Option<AutoBookingTask>, TaskError> {
        self.inner.get(id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<AutoBookingTask>, TaskError> {
        self.inner.list(filter)
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        self.inner.count(filter)
    }

    fn cancel(&self, id: &str) -> Result<AutoBookingTask, TaskError> {
        self.inner.cancel(id)
    }

    fn transition(
        &self,
        id: &str,
        from: &str,
        to: TaskState,
    ) -> Result<AutoBookingTask, TaskError> {
        if Self::take(&self.failing_transitions) {
            return Err(TaskError::Database("injected transition failure".to_string()));
        }
        self.inner.transition(id, from, to)
    }

    fn record_attempt(&self, id: &str) -> Result<AutoBookingTask, TaskError> {
        if Self::take(&self.failing_record_attempts) {
            return Err(TaskError::Database(
                "injected record_attempt failure".to_string(),
            ));
        }
        self.inner.record_attempt(id)
    }
}
