use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use texsync_store::{FsJobStore, JobStore, ProjectLayout};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use texsync_api::config::ServerConfig;
use texsync_api::router::build_app_router;
use texsync_api::state::AppState;
use texsync_api::{engine, ws};
use texsync_store::projects::ProjectCatalog;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "texsync_api=debug,texsync_compiler=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        files_dir = %config.files_dir.display(),
        compile_mode = config.compile_mode.as_str(),
        "Loaded server configuration",
    );

    // --- Project storage ---
    let layout = ProjectLayout::new(&config.files_dir);
    let catalog = ProjectCatalog::load(layout.clone())
        .await
        .expect("Failed to load project catalog");
    let jobs: Arc<dyn JobStore> = Arc::new(FsJobStore::new(layout));

    // --- App state ---
    let toolchain = engine::toolchain_for(&config);
    let state = AppState::new(config.clone(), catalog, jobs, toolchain);
    let ws_manager = Arc::clone(&state.ws_manager);
    let dispatcher = Arc::clone(&state.dispatcher);

    // --- Heartbeat ---
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&ws_manager),
        config.heartbeat_interval(),
        heartbeat_cancel.clone(),
    );

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

    // Upgraded sockets would otherwise keep the server from finishing.
    let shutdown_ws = Arc::clone(&ws_manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_ws.shutdown_all().await;
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let running = dispatcher.running_tasks();
    if !dispatcher
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await
    {
        tracing::warn!(running, "In-process compiles still running at shutdown");
    }
    tracing::info!("Compile dispatcher stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(5), heartbeat_handle)
        .await
        .is_err()
    {
        tracing::warn!("Heartbeat task did not stop in time");
    }
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
