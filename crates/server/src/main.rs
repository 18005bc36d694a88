// Pulse server
// Decision: Expired queues are swept by a background loop for every backend, in addition to the read-path sweep
// Decision: Shutdown stops accepting requests, then drains in-flight background publishes

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pulse_core::{EventLog, InMemoryEventLog, NotificationService, PostgresEventLog, QueueConfig};
use pulse_server::auth::{AuthConfig, AuthState};
use pulse_server::config::{DatabaseConfig, ServerConfig, StoreBackend};
use pulse_server::maintenance::purge_loop;
use pulse_server::telemetry::{init_tracing, TelemetryConfig};
use pulse_server::{build_app, AppState};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pulse-server starting...");

    let server_config = ServerConfig::from_env().context("Failed to load server configuration")?;
    let queue_config = QueueConfig::from_env();
    queue_config
        .validate()
        .context("Invalid queue configuration")?;

    let auth_config = AuthConfig::from_env().context("Failed to load auth configuration")?;
    tracing::info!(mode = ?auth_config.mode, "Authentication configured");

    let cancel = CancellationToken::new();
    let background = TaskTracker::new();

    let store: Arc<dyn EventLog> = match server_config.store_backend {
        StoreBackend::Postgres => {
            let db = server_config
                .database
                .as_ref()
                .context("DATABASE_URL environment variable required")?;
            connect_postgres(db).await? as Arc<dyn EventLog>
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; events are lost on restart");
            Arc::new(InMemoryEventLog::new())
        }
    };

    background.spawn(purge_loop(
        store.clone(),
        server_config.purge_interval,
        cancel.clone(),
    ));

    let service = Arc::new(NotificationService::new(store, queue_config));
    let state = AppState::new(service.clone(), AuthState::new(auth_config));

    if !server_config.api_prefix.is_empty() {
        tracing::info!(prefix = %server_config.api_prefix, "API prefix configured");
    }
    tracing::info!(origins = ?server_config.cors.allowed_origins, "CORS origins configured");

    let app = build_app(state, &server_config.api_prefix, &server_config.cors);

    let addr = format!("0.0.0.0:{}", server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, draining background work");
    cancel.cancel();
    background.close();

    if let Err(e) = service.shutdown().await {
        tracing::warn!(error = %e, "In-flight publishes did not drain cleanly");
    }
    background.wait().await;

    tracing::info!("pulse-server stopped");
    Ok(())
}

async fn connect_postgres(db: &DatabaseConfig) -> Result<Arc<PostgresEventLog>> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .min_connections(db.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&db.url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(
        max_connections = db.max_connections,
        min_connections = db.min_connections,
        "Connected to database"
    );

    let store = PostgresEventLog::new(pool);
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
