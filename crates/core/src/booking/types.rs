//! Booking client types.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vault::Credentials;

/// Result of a successful reservation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmation {
    /// Provider-assigned reservation id.
    pub reservation_id: String,
    /// Venue that was booked.
    pub venue_id: String,
    /// Slot that was booked.
    pub time_slot: String,
    /// When the provider confirmed the reservation.
    pub confirmed_at: DateTime<Utc>,
}

/// Classified failure of one booking attempt.
#[derive(Debug, Clone, Error)]
pub enum BookingError {
    /// The slot was already taken by someone else. Expected contention
    /// during a rush, never retried.
    #[error("slot already taken")]
    SlotTaken,

    /// The provider rejected the credentials. Never retried.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Timeout, network error or 5xx-equivalent; worth retrying.
    #[error("transient booking failure: {0}")]
    Transient(String),

    /// The per-call timeout elapsed. Classified as transient.
    #[error("booking attempt timed out after {0}s")]
    Timeout(u64),
}

impl BookingError {
    /// Returns true if the failure is expected to be retry-worthy.
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::Transient(_) | BookingError::Timeout(_))
    }
}

/// Trait for booking backends.
///
/// Performs one reservation attempt against the external venue system.
/// The engine never implements the provider's authentication protocol
/// or catalog semantics; it only invokes this capability and interprets
/// the classified outcome.
#[async_trait]
pub trait BookingClient: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &str;

    /// Perform one reservation attempt.
    async fn attempt(
        &self,
        credentials: &Credentials,
        venue_id: &str,
        target_date: NaiveDate,
        time_slot: &str,
    ) -> Result<BookingConfirmation, BookingError>;
}
