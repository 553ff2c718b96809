//! HTTP booking client implementation.
//!
//! Talks to the venue provider's reservation endpoint and classifies the
//! response into the outcome taxonomy the executor understands.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BookingConfig;
use crate::vault::Credentials;

use super::{BookingClient, BookingConfirmation, BookingError};

/// HTTP client for the external booking provider.
pub struct HttpBookingClient {
    client: Client,
    config: BookingConfig,
}

/// Request body for a reservation attempt.
#[derive(Debug, Serialize)]
struct ReserveRequest<'a> {
    username: &'a str,
    password: &'a str,
    venue_id: &'a str,
    booking_date: String,
    time_no: &'a str,
}

/// Provider response for a successful reservation.
#[derive(Debug, Deserialize)]
struct ReserveResponse {
    reservation_id: String,
}

impl HttpBookingClient {
    /// Create a new HTTP booking client.
    pub fn new(config: BookingConfig) -> Result<Self, BookingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| BookingError::Transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl BookingClient for HttpBookingClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn attempt(
        &self,
        credentials: &Credentials,
        venue_id: &str,
        target_date: NaiveDate,
        time_slot: &str,
    ) -> Result<BookingConfirmation, BookingError> {
        let url = format!("{}/reservations", self.base_url());

        let body = ReserveRequest {
            username: &credentials.username,
            password: &credentials.password,
            venue_id,
            booking_date: target_date.format("%Y-%m-%d").to_string(),
            time_no: time_slot,
        };

        debug!(
            "Submitting reservation: venue={} date={} slot={}",
            venue_id, target_date, time_slot
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BookingError::Timeout(self.config.timeout_secs)
                } else {
                    BookingError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let parsed: ReserveResponse = response.json().await.map_err(|e| {
                    BookingError::Transient(format!("malformed provider response: {}", e))
                })?;

                Ok(BookingConfirmation {
                    reservation_id: parsed.reservation_id,
                    venue_id: venue_id.to_string(),
                    time_slot: time_slot.to_string(),
                    confirmed_at: Utc::now(),
                })
            }
            StatusCode::CONFLICT => Err(BookingError::SlotTaken),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let text = response.text().await.unwrap_or_default();
                Err(BookingError::AuthRejected(
                    text.chars().take(200).collect::<String>(),
                ))
            }
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(BookingError::Transient(format!("provider returned {}", s)))
            }
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(BookingError::Transient(format!(
                    "unexpected provider response {}: {}",
                    s,
                    text.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}
