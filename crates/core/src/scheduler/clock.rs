//! Trigger clock: fires tasks when their fire time arrives.
//!
//! Keeps an in-memory due-set ordered by fire time and sleeps until the
//! earliest entry. Store mutations reach it through `ClockCommand`s, so
//! a new earliest task wakes it immediately instead of waiting out a
//! poll interval.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::task::{TaskError, TaskState, TaskStore};

use super::types::{ClockCommand, DueTask};
use super::SchedulerConfig;

// Wait before re-attempting a tick after a store error, so a struggling
// database is not hammered in a tight loop.
const STORE_RETRY_DELAY: Duration = Duration::from_millis(500);

pub(crate) struct TriggerClock {
    store: Arc<dyn TaskStore>,
    config: SchedulerConfig,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, String)>>,
    // Cancelled ids whose heap entries have not been popped yet.
    tombstones: HashSet<String>,
}

impl TriggerClock {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        config: SchedulerConfig,
        initial: Vec<(String, DateTime<Utc>)>,
    ) -> Self {
        let heap = initial
            .into_iter()
            .map(|(id, fire_time)| Reverse((fire_time, id)))
            .collect();

        Self {
            store,
            config,
            heap,
            tombstones: HashSet::new(),
        }
    }

    /// Run the clock loop until shutdown.
    pub(crate) async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ClockCommand>,
        due_tx: mpsc::Sender<DueTask>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Trigger clock started with {} scheduled tasks", self.heap.len());

        loop {
            let next_fire = self.heap.peek().map(|Reverse((t, _))| *t);

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Trigger clock received shutdown signal");
                    break;
                }
                command = command_rx.recv() => {
                    match command {
                        Some(command) => self.apply(command),
                        None => {
                            info!("Clock command channel closed");
                            break;
                        }
                    }
                }
                _ = sleep_until(next_fire) => {
                    self.fire_due(&due_tx).await;
                }
            }
        }

        info!("Trigger clock stopped");
    }

    fn apply(&mut self, command: ClockCommand) {
        match command {
            ClockCommand::Insert { id, fire_time } => {
                self.tombstones.remove(&id);
                self.heap.push(Reverse((fire_time, id)));
            }
            ClockCommand::Remove { id } => {
                self.tombstones.insert(id);
            }
        }
    }

    /// Fire every task whose time has come, in fire time order.
    async fn fire_due(&mut self, due_tx: &mpsc::Sender<DueTask>) {
        let window = chrono::Duration::milliseconds(self.config.max_admission_delay_ms as i64);

        loop {
            let now = Utc::now();
            match self.heap.peek() {
                Some(Reverse((fire_time, _))) if *fire_time <= now => {}
                _ => break,
            }
            let Some(Reverse((fire_time, id))) = self.heap.pop() else {
                break;
            };

            if self.tombstones.remove(&id) {
                debug!("Skipping cancelled task {}", id);
                continue;
            }

            let triggered_at = Utc::now();
            let missed_window = triggered_at - fire_time >= window;
            let state = TaskState::Triggered {
                triggered_at,
                missed_window,
            };

            match self.store.transition(&id, "pending", state) {
                Ok(_) => {
                    if missed_window {
                        warn!(
                            "Task {} fired {}s past its fire time",
                            id,
                            (triggered_at - fire_time).num_seconds()
                        );
                    }
                    let due = DueTask {
                        id: id.clone(),
                        fire_time,
                        triggered_at,
                        missed_window,
                    };
                    if due_tx.send(due).await.is_err() {
                        warn!("Dispatcher channel closed, dropping trigger for task {}", id);
                        break;
                    }
                }
                Err(TaskError::Conflict { .. }) => {
                    debug!("Task {} no longer pending at fire time, skipping", id);
                }
                Err(TaskError::NotFound(_)) => {
                    debug!("Task {} vanished before its fire time, skipping", id);
                }
                Err(e) => {
                    // The task is still pending; keep it in the due-set
                    // and retry the tick after a short delay.
                    warn!("Failed to trigger task {}, will retry: {}", id, e);
                    self.heap.push(Reverse((fire_time, id)));
                    tokio::time::sleep(STORE_RETRY_DELAY).await;
                    break;
                }
            }
        }
    }
}

/// Sleep until the given instant, or forever when there is nothing due.
async fn sleep_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(deadline) => {
            let wait = (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending().await,
    }
}
