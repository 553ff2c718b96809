use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotrush_core::{
    load_config, validate_config, BookingClient, BookingScheduler, CredentialVault,
    HttpBookingClient, SqliteTaskStore, StaticVault, TaskStore,
};

use slotrush_server::api::create_router;
use slotrush_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SLOTRUSH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Invalid configuration")?;

    info!("Starting slotrush v{}", VERSION);

    // Task store
    let store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::new(&config.database.path)
            .with_context(|| format!("Failed to open database at {:?}", config.database.path))?,
    );

    // Scheduler (only when enabled and a booking endpoint is configured)
    let scheduler = if !config.scheduler.enabled {
        info!("Scheduler disabled by configuration");
        None
    } else if let Some(booking_config) = config.booking.clone() {
        let vault = Arc::new(StaticVault::new(&config.accounts));
        info!(
            "Using credential vault: {} ({} accounts)",
            vault.name(),
            config.accounts.len()
        );
        let booking = Arc::new(
            HttpBookingClient::new(booking_config).context("Failed to create booking client")?,
        );
        info!("Using booking client: {}", booking.name());
        let scheduler = Arc::new(BookingScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&store),
            vault,
            booking,
        ));
        scheduler.start().context("Failed to start scheduler")?;
        Some(scheduler)
    } else {
        warn!("Scheduler enabled but no [booking] section configured, tasks will not execute");
        None
    };

    // Application state and router
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&store),
        scheduler.clone(),
    ));
    let app = create_router(app_state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain the scheduler after the HTTP server is gone
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
