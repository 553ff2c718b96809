//! Scheduler status API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use slotrush_core::SchedulerStatus;

use crate::state::AppState;

/// Response for scheduler status.
///
/// `available` is false when the server runs without a scheduler, e.g.
/// no booking endpoint configured or scheduling disabled.
#[derive(Debug, Serialize)]
pub struct SchedulerStatusResponse {
    pub available: bool,
    #[serde(flatten)]
    pub status: SchedulerStatus,
}

/// Get current scheduler status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatusResponse> {
    match state.scheduler() {
        Some(scheduler) => Json(SchedulerStatusResponse {
            available: true,
            status: scheduler.status(),
        }),
        None => Json(SchedulerStatusResponse {
            available: false,
            status: SchedulerStatus::default(),
        }),
    }
}
