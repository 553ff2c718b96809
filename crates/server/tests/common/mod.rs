//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling comprehensive E2E testing
//! without a real venue provider.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use slotrush_core::{
    config::{AccountConfig, DatabaseConfig, ServerConfig},
    testing::{MockBookingClient, MockVault},
    BookingClient, BookingScheduler, Config, CredentialVault, SchedulerConfig, SqliteTaskStore,
    TaskStore,
};

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Credential resolution (MockVault)
/// - Booking attempts (MockBookingClient)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_task_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/tasks", json!({
///         "venue_id": "venue-1",
///         "account_id": "a1",
///         "target_date": "2031-05-21",
///         "time_slot": "08:00-10:00"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Task store shared with the server
    pub store: Arc<SqliteTaskStore>,
    /// Mock vault - configure accounts and outages
    pub vault: Arc<MockVault>,
    /// Mock booking client - script attempt outcomes
    pub booking: Arc<MockBookingClient>,
    /// Running scheduler, when enabled
    pub scheduler: Option<Arc<BookingScheduler>>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture without a running scheduler.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        // Create mocks
        let vault = Arc::new(MockVault::new().with_account("a1", "alice", "secret"));
        let booking = Arc::new(MockBookingClient::new());

        let scheduler_config = SchedulerConfig {
            worker_count: 2,
            max_admission_delay_ms: 2_000,
            max_attempts: 3,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 50,
            attempt_timeout_secs: 2,
            ..Default::default()
        };

        // Create config
        let config = Config {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            scheduler: scheduler_config.clone(),
            booking: None,
            accounts: vec![AccountConfig {
                id: "a1".to_string(),
                username: "alice".to_string(),
                password: "secret".to_string(),
            }],
        };

        // Create store
        let store =
            Arc::new(SqliteTaskStore::new(&db_path).expect("Failed to create task store"));

        // Optionally start a scheduler wired to the mocks
        let scheduler = if test_config.enable_scheduler {
            let scheduler = Arc::new(BookingScheduler::new(
                scheduler_config,
                Arc::clone(&store) as Arc<dyn TaskStore>,
                Arc::clone(&vault) as Arc<dyn CredentialVault>,
                Arc::clone(&booking) as Arc<dyn BookingClient>,
            ));
            scheduler.start().expect("Failed to start scheduler");
            Some(scheduler)
        } else {
            None
        };

        // Create app state and router
        let state = Arc::new(slotrush_server::state::AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn TaskStore>,
            scheduler.clone(),
        ));
        let router = slotrush_server::api::create_router(state);

        Self {
            router,
            store,
            vault,
            booking,
            scheduler,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and return the raw body as text (for
    /// non-JSON endpoints like /metrics).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body, "application/json").await
    }

    /// Send a request with raw string body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Start a scheduler wired to the mocks
    pub enable_scheduler: bool,
}

impl TestConfig {
    /// Create config with the scheduler running.
    pub fn with_scheduler() -> Self {
        Self {
            enable_scheduler: true,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
