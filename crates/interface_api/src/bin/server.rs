//! Renewal Core - API Server Binary
//!
//! This binary starts the HTTP API server for the renewal management system.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin renewal-api
//!
//! # Run with environment variables
//! APP_PORT=8080 APP_DATABASE_URL=postgres://... cargo run --bin renewal-api
//! ```
//!
//! # Environment Variables
//!
//! * `APP_HOST` - Server host (default: 0.0.0.0)
//! * `APP_PORT` - Server port (default: 8080)
//! * `APP_JWT_SECRET` - JWT signing secret (required in production)
//! * `APP_DATABASE_URL` - PostgreSQL connection string
//! * `APP_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `APP_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! * `APP_ENCRYPTION_KEY` - base64 AES-256 key for provider credentials

use std::net::SocketAddr;

use anyhow::Context;
use interface_api::{create_router, config::{ApiConfig, LogFormat}, AppState};
use infra_db::{create_pool, run_migrations, DatabaseConfig};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, establishes database connection,
/// runs migrations and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading configuration")?;
    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Renewal Core API Server"
    );

    let db_config = DatabaseConfig::new(config.database_url.clone())
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections);
    let pool = create_pool(db_config).await.context("connecting to database")?;

    run_migrations(&pool).await.context("running migrations")?;

    let state = AppState::new(pool, config.clone()).context("building application state")?;
    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that cannot be installed is logged and that signal never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
