//! Mock booking client for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::booking::{BookingClient, BookingConfirmation, BookingError};
use crate::vault::Credentials;

/// A recorded booking attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    /// Username the attempt was made with.
    pub username: String,
    /// Venue that was requested.
    pub venue_id: String,
    /// Date that was requested.
    pub target_date: NaiveDate,
    /// Slot that was requested.
    pub time_slot: String,
    /// When the attempt was made.
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the BookingClient trait.
///
/// Provides controllable behavior for testing:
/// - Script attempt outcomes in order
/// - Track attempts for assertions
/// - Slow calls down to exercise timeouts and concurrency limits
///
/// Unscripted attempts succeed with a generated reservation id.
pub struct MockBookingClient {
    scripted: Mutex<VecDeque<Result<BookingConfirmation, BookingError>>>,
    recorded: Mutex<Vec<RecordedAttempt>>,
    call_delay: Mutex<Option<Duration>>,
    reservation_counter: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockBookingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBookingClient {
    /// Create a new mock booking client.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            recorded: Mutex::new(Vec::new()),
            call_delay: Mutex::new(None),
            reservation_counter: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script the next attempt to succeed with this confirmation.
    pub fn push_success(&self, confirmation: BookingConfirmation) {
        self.scripted.lock().unwrap().push_back(Ok(confirmation));
    }

    /// Script the next attempt to fail with this error.
    pub fn push_error(&self, error: BookingError) {
        self.scripted.lock().unwrap().push_back(Err(error));
    }

    /// Make every attempt take at least this long.
    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock().unwrap() = Some(delay);
    }

    /// Number of attempts made so far.
    pub fn attempt_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    /// All recorded attempts, in order.
    pub fn recorded_attempts(&self) -> Vec<RecordedAttempt> {
        self.recorded.lock().unwrap().clone()
    }

    /// Highest number of attempts that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookingClient for MockBookingClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn attempt(
        &self,
        credentials: &Credentials,
        venue_id: &str,
        target_date: NaiveDate,
        time_slot: &str,
    ) -> Result<BookingConfirmation, BookingError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        self.recorded.lock().unwrap().push(RecordedAttempt {
            username: credentials.username.clone(),
            venue_id: venue_id.to_string(),
            target_date,
            time_slot: time_slot.to_string(),
            timestamp: Utc::now(),
        });

        let delay = *self.call_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.scripted.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Some(outcome) => outcome,
            None => {
                let n = self.reservation_counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(BookingConfirmation {
                    reservation_id: format!("mock-res-{:04}", n),
                    venue_id: venue_id.to_string(),
                    time_slot: time_slot.to_string(),
                    confirmed_at: Utc::now(),
                })
            }
        }
    }
}
