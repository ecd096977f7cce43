use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labcoord_api::background;
use labcoord_api::config::ServerConfig;
use labcoord_api::router::build_app_router;
use labcoord_api::state::AppState;
use labcoord_db::{BlobStore, MemoryBlobStore, MemoryStore, PgBlobStore, PgStore, RecordStore};
use labcoord_events::EventBus;
use labcoord_fleet::HttpWorkerClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labcoord_api=debug,labcoord_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Stores ---
    let (store, blobs): (Arc<dyn RecordStore>, Arc<dyn BlobStore>) = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = labcoord_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            labcoord_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            labcoord_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            (
                Arc::new(PgStore::new(pool.clone())),
                Arc::new(PgBlobStore::new(pool)),
            )
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            (Arc::new(MemoryStore::new()), Arc::new(MemoryBlobStore::new()))
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_cancel = CancellationToken::new();
    let logger_handle = tokio::spawn(background::event_logger::run(
        event_bus.subscribe(),
        logger_cancel.clone(),
    ));
    tracing::info!("Event bus created");

    // --- Worker fleet client ---
    let workers = Arc::new(HttpWorkerClient::new(
        config.probe_timeout(),
        config.submit_timeout(),
    ));

    // --- App state ---
    let retry_cancel = CancellationToken::new();
    let state = AppState::new(
        config.clone(),
        store,
        blobs,
        workers,
        Arc::clone(&event_bus),
        retry_cancel.clone(),
    );
    let retry = state.retry.clone();

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let active = retry.active();
    retry_cancel.cancel();
    let drained = retry
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!(active, drained, "Retry loops stopped");

    logger_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;
    tracing::info!("Event logger stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
