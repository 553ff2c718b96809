//! Task API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use slotrush_core::{AutoBookingTask, CreateTaskRequest, TaskError, TaskFilter, TaskState};

use crate::metrics::TASKS_CREATED_TOTAL;
use crate::state::AppState;

/// Maximum allowed limit for task queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for task queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a task
#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    /// Venue to book
    pub venue_id: String,
    /// Account whose credentials will be used
    pub account_id: String,
    /// Date being reserved, as YYYY-MM-DD
    pub target_date: String,
    /// Slot descriptor, e.g. "08:00-10:00"
    pub time_slot: String,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Filter by state type
    pub state: Option<String>,
    /// Filter by account
    pub account_id: Option<String>,
    /// Maximum number of tasks to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for task operations
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub venue_id: String,
    pub account_id: String,
    pub target_date: NaiveDate,
    pub time_slot: String,
    pub fire_time: String,
    pub state: TaskState,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AutoBookingTask> for TaskResponse {
    fn from(task: AutoBookingTask) -> Self {
        Self {
            id: task.id,
            venue_id: task.venue_id,
            account_id: task.account_id,
            target_date: task.target_date,
            time_slot: task.time_slot,
            fire_time: task.fire_time.to_rfc3339(),
            state: task.state,
            attempts: task.attempts,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<TaskErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(TaskErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<TaskErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(TaskErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new auto-booking task
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<TaskResponse>), impl IntoResponse> {
    if body.venue_id.trim().is_empty() {
        return Err(bad_request("venue_id must not be empty"));
    }
    if body.account_id.trim().is_empty() {
        return Err(bad_request("account_id must not be empty"));
    }
    if body.time_slot.trim().is_empty() {
        return Err(bad_request("time_slot must not be empty"));
    }

    let target_date = NaiveDate::parse_from_str(&body.target_date, "%Y-%m-%d")
        .map_err(|_| bad_request(format!("invalid target_date: {}", body.target_date)))?;

    let request = CreateTaskRequest {
        venue_id: body.venue_id.clone(),
        account_id: body.account_id.clone(),
        target_date,
        time_slot: body.time_slot.clone(),
    };

    let task = state.store().create(request).map_err(internal_error)?;
    TASKS_CREATED_TOTAL.inc();

    // Register the fire time with the running scheduler, if any. A
    // dropped notification is recovered on the next scheduler start.
    if let Some(handle) = state.scheduler_handle() {
        if let Err(e) = handle.task_created(&task.id, task.fire_time).await {
            debug!("Failed to notify scheduler of task {}: {}", task.id, e);
        }
    }

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    match state.store().get(&id) {
        Ok(Some(task)) => Ok(Json(TaskResponse::from(task))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(TaskErrorResponse {
                error: format!("Task not found: {}", id),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// List tasks with optional filters
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<ListTasksResponse>, (StatusCode, Json<TaskErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TaskFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref state_filter) = params.state {
        filter = filter.with_state(state_filter.as_str());
    }

    if let Some(ref account_id) = params.account_id {
        filter = filter.with_account_id(account_id.as_str());
    }

    let tasks = state.store().list(&filter).map_err(internal_error)?;

    // Get total count (without pagination)
    let count_filter = TaskFilter {
        limit: i64::MAX,
        offset: 0,
        ..filter.clone()
    };

    let total = state.store().count(&count_filter).map_err(internal_error)?;

    Ok(Json(ListTasksResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Cancel a task (DELETE endpoint)
///
/// Succeeds only while the task is still pending; anything later is a
/// conflict because the booking attempt may already be in flight.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    let task = match state.store().cancel(&id) {
        Ok(task) => task,
        Err(TaskError::NotFound(_)) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(TaskErrorResponse {
                    error: format!("Task not found: {}", id),
                }),
            ));
        }
        Err(e @ TaskError::Conflict { .. }) => {
            return Err((
                StatusCode::CONFLICT,
                Json(TaskErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
        Err(e) => return Err(internal_error(e)),
    };

    if let Some(handle) = state.scheduler_handle() {
        if let Err(e) = handle.task_cancelled(&task.id).await {
            debug!("Failed to notify scheduler of cancel {}: {}", task.id, e);
        }
    }

    Ok(Json(TaskResponse::from(task)))
}
