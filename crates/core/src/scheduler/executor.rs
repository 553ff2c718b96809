//! Execution coordinator: runs the booking attempt loop for one task.
//!
//! The attempt counter is persisted before each booking call so that a
//! crash mid-call shows up as a counted attempt, never as a silent
//! retry that could double-book.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::booking::{BookingClient, BookingError};
use crate::task::{FailureReason, TaskError, TaskState, TaskStore};
use crate::vault::CredentialVault;

use super::backoff::retry_delay;
use super::types::DueTask;
use super::SchedulerConfig;

pub(crate) struct ExecutionCoordinator {
    store: Arc<dyn TaskStore>,
    vault: Arc<dyn CredentialVault>,
    booking: Arc<dyn BookingClient>,
    config: SchedulerConfig,
}

impl ExecutionCoordinator {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        vault: Arc<dyn CredentialVault>,
        booking: Arc<dyn BookingClient>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            vault,
            booking,
            config,
        }
    }

    /// Execute a due task to a terminal state.
    pub(crate) async fn execute(&self, due: DueTask) {
        // Re-read before doing anything; the task may have been resolved
        // by another path between trigger and admission.
        let task = match self.store.get(&due.id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!("Task {} vanished before execution", due.id);
                return;
            }
            Err(e) => {
                warn!("Failed to load task {} for execution: {}", due.id, e);
                return;
            }
        };

        if !matches!(task.state, TaskState::Triggered { .. }) {
            debug!(
                "Task {} is {} rather than triggered, skipping execution",
                due.id,
                task.state.state_type()
            );
            return;
        }

        let credentials = match self.vault.resolve(&task.account_id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(
                    "Credential resolution failed for task {} (account {}): {}",
                    due.id, task.account_id, e
                );
                self.fail(&due, FailureReason::CredentialError, e.to_string());
                return;
            }
        };

        let attempt_timeout = Duration::from_secs(self.config.attempt_timeout_secs);
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(retry_delay(&self.config, attempt - 1)).await;

                // The task may have resolved while we slept.
                match self.store.get(&due.id) {
                    Ok(Some(task)) if matches!(task.state, TaskState::Triggered { .. }) => {}
                    Ok(Some(task)) => {
                        debug!(
                            "Task {} became {} during backoff, stopping retries",
                            due.id,
                            task.state.state_type()
                        );
                        return;
                    }
                    Ok(None) => {
                        warn!("Task {} vanished during backoff", due.id);
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to re-read task {} during backoff: {}", due.id, e);
                        return;
                    }
                }
            }

            // An unrecorded attempt must not reach the provider; burn the
            // attempt and retry after backoff instead of abandoning the
            // task in a non-terminal state.
            if let Err(e) = self.store.record_attempt(&due.id) {
                warn!("Failed to record attempt for task {}: {}", due.id, e);
                last_error = format!("failed to record attempt: {}", e);
                continue;
            }

            debug!(
                "Booking attempt {}/{} for task {} (venue {}, slot {})",
                attempt, self.config.max_attempts, due.id, task.venue_id, task.time_slot
            );

            let call = self.booking.attempt(
                &credentials,
                &task.venue_id,
                task.target_date,
                &task.time_slot,
            );

            match tokio::time::timeout(attempt_timeout, call).await {
                Ok(Ok(confirmation)) => {
                    info!(
                        "Task {} booked venue {} slot {} (reservation {})",
                        due.id, task.venue_id, task.time_slot, confirmation.reservation_id
                    );
                    let state = TaskState::Succeeded {
                        confirmation,
                        executed_at: Utc::now(),
                        missed_window: due.missed_window,
                    };
                    self.resolve(&due, state);
                    return;
                }
                Ok(Err(BookingError::SlotTaken)) => {
                    info!("Slot already taken for task {}", due.id);
                    self.fail(&due, FailureReason::SlotTaken, "slot already taken".to_string());
                    return;
                }
                Ok(Err(BookingError::AuthRejected(message))) => {
                    warn!("Authentication rejected for task {}: {}", due.id, message);
                    self.fail(&due, FailureReason::AuthError, message);
                    return;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Booking attempt {}/{} failed for task {}: {}",
                        attempt, self.config.max_attempts, due.id, e
                    );
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "Booking attempt {}/{} timed out for task {}",
                        attempt, self.config.max_attempts, due.id
                    );
                    last_error = format!(
                        "attempt timed out after {}s",
                        self.config.attempt_timeout_secs
                    );
                }
            }
        }

        warn!(
            "Task {} exhausted {} attempts, last error: {}",
            due.id, self.config.max_attempts, last_error
        );
        self.fail(&due, FailureReason::RetriesExhausted, last_error);
    }

    /// Fail a task terminally. Racing transitions are tolerated.
    pub(crate) fn fail(&self, due: &DueTask, reason: FailureReason, error: String) {
        let state = TaskState::Failed {
            reason,
            error,
            failed_at: Utc::now(),
            missed_window: due.missed_window,
        };
        self.resolve(due, state);
    }

    fn resolve(&self, due: &DueTask, state: TaskState) {
        match self.store.transition(&due.id, "triggered", state) {
            Ok(_) => {}
            Err(TaskError::Conflict { current_state, .. }) => {
                debug!(
                    "Task {} already resolved to {}, dropping result",
                    due.id, current_state
                );
            }
            Err(e) => {
                warn!("Failed to record outcome for task {}: {}", due.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingConfirmation;
    use crate::task::{CreateTaskRequest, SqliteTaskStore};
    use crate::testing::{MockBookingClient, MockVault};
    use chrono::NaiveDate;

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            max_attempts: 3,
            retry_base_delay_ms: 5,
            retry_max_delay_ms: 20,
            attempt_timeout_secs: 5,
            ..SchedulerConfig::default()
        }
    }

    struct Harness {
        store: Arc<SqliteTaskStore>,
        booking: Arc<MockBookingClient>,
        coordinator: ExecutionCoordinator,
    }

    fn harness(config: SchedulerConfig) -> Harness {
        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let vault = Arc::new(MockVault::new().with_account("a1", "alice", "secret"));
        let booking = Arc::new(MockBookingClient::new());
        let coordinator = ExecutionCoordinator::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            vault,
            Arc::clone(&booking) as Arc<dyn BookingClient>,
            config,
        );
        Harness {
            store,
            booking,
            coordinator,
        }
    }

    fn triggered_task(store: &SqliteTaskStore) -> DueTask {
        let task = store
            .create(CreateTaskRequest {
                venue_id: "venue-1".to_string(),
                account_id: "a1".to_string(),
                target_date: NaiveDate::from_ymd_opt(2023, 5, 21).unwrap(),
                time_slot: "08:00-10:00".to_string(),
            })
            .unwrap();
        let triggered_at = Utc::now();
        store
            .transition(
                &task.id,
                "pending",
                TaskState::Triggered {
                    triggered_at,
                    missed_window: false,
                },
            )
            .unwrap();
        DueTask {
            id: task.id,
            fire_time: task.fire_time,
            triggered_at,
            missed_window: false,
        }
    }

    fn confirmation() -> BookingConfirmation {
        BookingConfirmation {
            reservation_id: "res-1".to_string(),
            venue_id: "venue-1".to_string(),
            time_slot: "08:00-10:00".to_string(),
            confirmed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        h.booking.push_success(confirmation());

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.state.state_type(), "succeeded");
        assert_eq!(task.attempts, 1);
        assert_eq!(h.booking.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_then_success() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        h.booking
            .push_error(BookingError::Transient("connection reset".to_string()));
        h.booking.push_success(confirmation());

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.state.state_type(), "succeeded");
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_retries() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        for _ in 0..3 {
            h.booking
                .push_error(BookingError::Transient("503".to_string()));
        }

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.attempts, 3);
        match &task.state {
            TaskState::Failed { reason, error, .. } => {
                assert!(matches!(reason, FailureReason::RetriesExhausted));
                assert!(error.contains("503"));
            }
            other => panic!("expected failed state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slot_taken_is_never_retried() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        h.booking.push_error(BookingError::SlotTaken);
        h.booking.push_success(confirmation());

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.attempts, 1);
        assert_eq!(h.booking.attempt_count(), 1);
        assert!(matches!(
            task.state,
            TaskState::Failed {
                reason: FailureReason::SlotTaken,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_auth_rejection_is_never_retried() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        h.booking
            .push_error(BookingError::AuthRejected("bad password".to_string()));

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.attempts, 1);
        assert!(matches!(
            task.state,
            TaskState::Failed {
                reason: FailureReason::AuthError,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_account_fails_without_attempts() {
        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let vault = Arc::new(MockVault::new());
        let booking = Arc::new(MockBookingClient::new());
        let coordinator = ExecutionCoordinator::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            vault,
            Arc::clone(&booking) as Arc<dyn BookingClient>,
            fast_config(),
        );

        let due = triggered_task(&store);
        coordinator.execute(due.clone()).await;

        let task = store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.attempts, 0);
        assert_eq!(booking.attempt_count(), 0);
        assert!(matches!(
            task.state,
            TaskState::Failed {
                reason: FailureReason::CredentialError,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_record_attempt_error_is_retried() {
        use crate::testing::FlakyTaskStore;

        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let flaky = Arc::new(FlakyTaskStore::new(
            Arc::clone(&store) as Arc<dyn TaskStore>
        ));
        let vault = Arc::new(MockVault::new().with_account("a1", "alice", "secret"));
        let booking = Arc::new(MockBookingClient::new());
        let coordinator = ExecutionCoordinator::new(
            Arc::clone(&flaky) as Arc<dyn TaskStore>,
            vault,
            Arc::clone(&booking) as Arc<dyn BookingClient>,
            fast_config(),
        );

        let due = triggered_task(&store);
        flaky.fail_next_record_attempts(1);
        booking.push_success(confirmation());

        coordinator.execute(due.clone()).await;

        // The first attempt was burned on the store error and never
        // reached the provider; the second went through.
        let task = store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.state.state_type(), "succeeded");
        assert_eq!(task.attempts, 1);
        assert_eq!(booking.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_record_attempt_errors_exhaust_retries() {
        use crate::testing::FlakyTaskStore;

        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let flaky = Arc::new(FlakyTaskStore::new(
            Arc::clone(&store) as Arc<dyn TaskStore>
        ));
        let vault = Arc::new(MockVault::new().with_account("a1", "alice", "secret"));
        let booking = Arc::new(MockBookingClient::new());
        let coordinator = ExecutionCoordinator::new(
            Arc::clone(&flaky) as Arc<dyn TaskStore>,
            vault,
            Arc::clone(&booking) as Arc<dyn BookingClient>,
            fast_config(),
        );

        let due = triggered_task(&store);
        flaky.fail_next_record_attempts(3);

        coordinator.execute(due.clone()).await;

        // Every attempt failed to record, so the provider was never
        // called and the task still reached a terminal state.
        assert_eq!(booking.attempt_count(), 0);
        let task = store.get(&due.id).unwrap().unwrap();
        match &task.state {
            TaskState::Failed { reason, error, .. } => {
                assert!(matches!(reason, FailureReason::RetriesExhausted));
                assert!(error.contains("failed to record attempt"));
            }
            other => panic!("expected failed state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_triggered_task_is_skipped() {
        let h = harness(fast_config());
        let due = triggered_task(&h.store);
        h.store
            .transition(
                &due.id,
                "triggered",
                TaskState::Failed {
                    reason: FailureReason::SchedulingMissedWindow,
                    error: "late".to_string(),
                    failed_at: Utc::now(),
                    missed_window: true,
                },
            )
            .unwrap();

        h.coordinator.execute(due.clone()).await;

        assert_eq!(h.booking.attempt_count(), 0);
        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.attempts, 0);
    }

    #[tokio::test]
    async fn test_missed_window_flag_propagates_to_outcome() {
        let h = harness(fast_config());
        let mut due = triggered_task(&h.store);
        due.missed_window = true;
        h.booking.push_success(confirmation());

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert!(task.state.missed_window());
        assert_eq!(task.state.state_type(), "succeeded");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let config = SchedulerConfig {
            max_attempts: 1,
            attempt_timeout_secs: 1,
            retry_base_delay_ms: 5,
            retry_max_delay_ms: 20,
            ..SchedulerConfig::default()
        };
        let h = harness(config);
        let due = triggered_task(&h.store);
        h.booking.push_success(confirmation());
        h.booking.set_call_delay(Duration::from_secs(5));

        h.coordinator.execute(due.clone()).await;

        let task = h.store.get(&due.id).unwrap().unwrap();
        match &task.state {
            TaskState::Failed { reason, error, .. } => {
                assert!(matches!(reason, FailureReason::RetriesExhausted));
                assert!(error.contains("timed out"));
            }
            other => panic!("expected failed state, got {:?}", other),
        }
    }
}
