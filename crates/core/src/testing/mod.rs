//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external collaborator
//! traits, allowing full scheduler testing without a real venue provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotrush_core::testing::{MockBookingClient, MockVault};
//!
//! let vault = MockVault::new().with_account("a1", "alice", "secret");
//! let booking = MockBookingClient::new();
//!
//! // Configure mock responses
//! booking.push_error(BookingError::SlotTaken);
//!
//! // Use in a BookingScheduler...
//! ```

mod flaky_store;
mod mock_booking_client;
mod mock_vault;

pub use flaky_store::FlakyTaskStore;
pub use mock_booking_client::{MockBookingClient, RecordedAttempt};
pub use mock_vault::MockVault;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::NaiveDate;

    use crate::task::CreateTaskRequest;

    /// Create a test task request with reasonable defaults.
    pub fn task_request(venue_id: &str, account_id: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            venue_id: venue_id.to_string(),
            account_id: account_id.to_string(),
            target_date: NaiveDate::from_ymd_opt(2023, 5, 21).unwrap(),
            time_slot: "08:00-10:00".to_string(),
        }
    }

    /// Create a test task request for a specific date and slot.
    pub fn task_request_for(
        venue_id: &str,
        account_id: &str,
        target_date: NaiveDate,
        time_slot: &str,
    ) -> CreateTaskRequest {
        CreateTaskRequest {
            venue_id: venue_id.to_string(),
            account_id: account_id.to_string(),
            target_date,
            time_slot: time_slot.to_string(),
        }
    }
}
