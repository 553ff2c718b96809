//! Booking scheduler for automated venue reservations.
//!
//! The scheduler drives auto-booking tasks to resolution:
//! - **Trigger clock**: event-driven, fires tasks at their fire time
//! - **Dispatcher**: bounded worker pool, earliest-due admission
//! - **Execution coordinator**: attempt loop with classified retries

mod backoff;
mod clock;
mod config;
mod dispatcher;
mod executor;
mod types;

pub use config::SchedulerConfig;
pub use types::{SchedulerError, SchedulerStatus};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::booking::BookingClient;
use crate::task::{TaskFilter, TaskStore};
use crate::vault::CredentialVault;

use clock::TriggerClock;
use dispatcher::Dispatcher;
use executor::ExecutionCoordinator;
use types::{ClockCommand, DueTask};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const DUE_CHANNEL_CAPACITY: usize = 64;

/// The booking scheduler - fires tasks on time and executes them
/// through the bounded worker pool.
pub struct BookingScheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    vault: Arc<dyn CredentialVault>,
    booking: Arc<dyn BookingClient>,

    // Runtime state
    running: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    command_tx: mpsc::Sender<ClockCommand>,
    command_rx: Mutex<Option<mpsc::Receiver<ClockCommand>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BookingScheduler {
    /// Create a new scheduler.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn TaskStore>,
        vault: Arc<dyn CredentialVault>,
        booking: Arc<dyn BookingClient>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        Self {
            config,
            store,
            vault,
            booking,
            running: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            shutdown_tx,
        }
    }

    /// Start the scheduler (spawns background tasks).
    ///
    /// Pending tasks already in the store are recovered into the clock;
    /// past-due ones fire immediately with their missed-window flag set.
    /// Triggered tasks left unresolved by a previous run are re-dispatched
    /// with a fresh admission window.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return Ok(());
        }

        let command_rx = match self.command_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(command_rx) = command_rx else {
            self.running.store(false, Ordering::SeqCst);
            return Err(SchedulerError::AlreadyStarted);
        };

        info!("Starting booking scheduler");

        let initial = self.recover_pending()?;
        let recovered = self.recover_triggered()?;
        let (due_tx, due_rx) = mpsc::channel(DUE_CHANNEL_CAPACITY);

        let clock = TriggerClock::new(
            Arc::clone(&self.store),
            self.config.clone(),
            initial,
        );
        let clock_shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(clock.run(command_rx, due_tx, clock_shutdown));

        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.vault),
            Arc::clone(&self.booking),
            self.config.clone(),
        ));
        let dispatcher = Dispatcher::new(
            coordinator,
            self.config.clone(),
            Arc::clone(&self.in_flight),
        );
        let dispatcher_shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(dispatcher.run(recovered, due_rx, dispatcher_shutdown));

        info!("Booking scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping booking scheduler");

        // Signal shutdown to the clock and dispatcher
        let _ = self.shutdown_tx.send(());

        // Give in-flight workers a moment to finish
        tokio::time::sleep(Duration::from_millis(200)).await;

        info!("Booking scheduler stopped");
    }

    /// Get current scheduler status.
    pub fn status(&self) -> SchedulerStatus {
        let count = |state: &str| {
            self.store
                .count(&TaskFilter::new().with_state(state))
                .unwrap_or(0) as usize
        };

        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            worker_count: self.config.worker_count,
            pending_count: count("pending"),
            triggered_count: count("triggered"),
            succeeded_count: count("succeeded"),
            failed_count: count("failed"),
            cancelled_count: count("cancelled"),
        }
    }

    /// Get a handle for notifying the scheduler of store mutations.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Load pending tasks from the store for clock seeding.
    fn recover_pending(&self) -> Result<Vec<(String, DateTime<Utc>)>, SchedulerError> {
        let filter = TaskFilter::new().with_state("pending").with_limit(10_000);
        let tasks = self.store.list(&filter)?;

        let now = Utc::now();
        let past_due = tasks.iter().filter(|t| t.fire_time <= now).count();
        if !tasks.is_empty() {
            info!(
                "Recovered {} pending tasks ({} past due)",
                tasks.len(),
                past_due
            );
        }

        Ok(tasks.into_iter().map(|t| (t.id, t.fire_time)).collect())
    }

    /// Load tasks a previous run triggered but never resolved.
    ///
    /// An unresolved attempt is treated as transient: the task is handed
    /// back to the dispatcher as due, measured from the recovery instant
    /// rather than its long-gone fire time. The coordinator's state
    /// re-read makes the re-dispatch safe against double execution.
    fn recover_triggered(&self) -> Result<Vec<DueTask>, SchedulerError> {
        let filter = TaskFilter::new().with_state("triggered").with_limit(10_000);
        let tasks = self.store.list(&filter)?;

        if !tasks.is_empty() {
            info!("Recovered {} unresolved triggered tasks", tasks.len());
        }

        let now = Utc::now();
        Ok(tasks
            .into_iter()
            .map(|t| DueTask {
                id: t.id,
                fire_time: t.fire_time,
                triggered_at: now,
                missed_window: true,
            })
            .collect())
    }
}

/// Cloneable handle for keeping the clock in sync with the store.
///
/// When the scheduler is not running the notifications are dropped; a
/// later start recovers pending tasks from the store anyway.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<ClockCommand>,
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Notify the clock of a newly created task.
    pub async fn task_created(
        &self,
        id: &str,
        fire_time: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::Relaxed) {
            debug!("Scheduler not running, dropping insert for task {}", id);
            return Ok(());
        }
        self.command_tx
            .send(ClockCommand::Insert {
                id: id.to_string(),
                fire_time,
            })
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }

    /// Notify the clock of a cancelled task.
    pub async fn task_cancelled(&self, id: &str) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::Relaxed) {
            debug!("Scheduler not running, dropping remove for task {}", id);
            return Ok(());
        }
        self.command_tx
            .send(ClockCommand::Remove { id: id.to_string() })
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }
}
