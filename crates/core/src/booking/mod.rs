//! Booking client abstraction.
//!
//! A booking client performs one reservation attempt against the
//! external venue system and reports a classified outcome. The engine
//! decides whether and when to retry.

mod http;
mod types;

pub use http::HttpBookingClient;
pub use types::{BookingClient, BookingConfirmation, BookingError};
