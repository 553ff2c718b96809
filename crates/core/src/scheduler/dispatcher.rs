//! Dispatcher: admits due tasks into the bounded worker pool.
//!
//! Tasks waiting for a free worker are held in a heap ordered by fire
//! time, so under contention the earliest-due booking always gets the
//! next available worker. A task that cannot be admitted before its
//! admission deadline has lost its booking window and is failed rather
//! than executed pointlessly late.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::task::FailureReason;

use super::executor::ExecutionCoordinator;
use super::types::DueTask;
use super::SchedulerConfig;

pub(crate) struct Dispatcher {
    coordinator: Arc<ExecutionCoordinator>,
    config: SchedulerConfig,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub(crate) fn new(
        coordinator: Arc<ExecutionCoordinator>,
        config: SchedulerConfig,
        in_flight: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            coordinator,
            config,
            in_flight,
        }
    }

    /// Run the dispatch loop until shutdown.
    ///
    /// `recovered` holds due tasks carried over from a previous run; they
    /// compete for workers like any other due task.
    pub(crate) async fn run(
        self,
        recovered: Vec<DueTask>,
        mut due_rx: mpsc::Receiver<DueTask>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.worker_count));
        let mut waiting: BinaryHeap<Reverse<DueTask>> =
            recovered.into_iter().map(Reverse).collect();

        info!(
            "Dispatcher started with {} workers",
            self.config.worker_count
        );
        if !waiting.is_empty() {
            info!("Re-queued {} recovered tasks for execution", waiting.len());
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Dispatcher received shutdown signal");
                    break;
                }
                due = due_rx.recv() => {
                    match due {
                        Some(due) => waiting.push(Reverse(due)),
                        None => {
                            info!("Trigger channel closed");
                            break;
                        }
                    }
                }
                permit = Arc::clone(&semaphore).acquire_owned(), if !waiting.is_empty() => {
                    let Ok(permit) = permit else { break };
                    let Some(Reverse(due)) = waiting.pop() else { continue };
                    self.admit(due, permit);
                }
            }
        }

        info!("Dispatcher stopped");
    }

    /// Hand one due task to a worker, or fail it if its window is gone.
    fn admit(&self, due: DueTask, permit: tokio::sync::OwnedSemaphorePermit) {
        let window = chrono::Duration::milliseconds(self.config.max_admission_delay_ms as i64);
        // Late-fired tasks are given a fresh window from the moment they
        // actually triggered; on-time tasks are measured from fire time.
        let deadline = if due.missed_window {
            due.triggered_at + window
        } else {
            due.fire_time + window
        };

        if Utc::now() > deadline {
            drop(permit);
            warn!(
                "Task {} waited past its admission deadline, failing",
                due.id
            );
            self.coordinator.fail(
                &due,
                FailureReason::SchedulingMissedWindow,
                "no worker available before the admission deadline".to_string(),
            );
            return;
        }

        debug!("Admitting task {} for execution", due.id);
        let coordinator = Arc::clone(&self.coordinator);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            coordinator.execute(due).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingClient;
    use crate::task::{CreateTaskRequest, SqliteTaskStore, TaskState, TaskStore};
    use crate::testing::{MockBookingClient, MockVault};
    use crate::vault::CredentialVault;
    use chrono::NaiveDate;
    use std::time::Duration;

    struct Harness {
        store: Arc<SqliteTaskStore>,
        booking: Arc<MockBookingClient>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let vault = Arc::new(MockVault::new().with_account("a1", "alice", "secret"));
        let booking = Arc::new(MockBookingClient::new());
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            vault as Arc<dyn CredentialVault>,
            Arc::clone(&booking) as Arc<dyn BookingClient>,
            SchedulerConfig::default(),
        ));
        let dispatcher = Dispatcher::new(
            coordinator,
            SchedulerConfig::default(),
            Arc::new(AtomicUsize::new(0)),
        );
        Harness {
            store,
            booking,
            dispatcher,
        }
    }

    fn triggered_due(store: &SqliteTaskStore) -> DueTask {
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

    fn permit() -> tokio::sync::OwnedSemaphorePermit {
        Arc::new(Semaphore::new(1)).try_acquire_owned().unwrap()
    }

    #[tokio::test]
    async fn test_admit_past_deadline_fails_without_executing() {
        let h = harness();
        // fire_time is years in the past and the window was not reset,
        // so the admission deadline is long gone.
        let due = triggered_due(&h.store);

        h.dispatcher.admit(due.clone(), permit());

        let task = h.store.get(&due.id).unwrap().unwrap();
        assert_eq!(task.state.state_type(), "failed");
        assert_eq!(
            task.state.failure_reason(),
            Some(crate::task::FailureReason::SchedulingMissedWindow)
        );
        assert_eq!(task.attempts, 0);
        assert_eq!(h.booking.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_admit_within_deadline_executes() {
        let h = harness();
        // A late fire gets a fresh window from its trigger instant.
        let mut due = triggered_due(&h.store);
        due.triggered_at = Utc::now();
        due.missed_window = true;

        h.dispatcher.admit(due.clone(), permit());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let task = h.store.get(&due.id).unwrap().unwrap();
            if task.state.is_terminal() {
                assert_eq!(task.state.state_type(), "succeeded");
                assert_eq!(h.booking.attempt_count(), 1);
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task never reached a terminal state"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
