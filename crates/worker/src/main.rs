//! Out-of-process compile worker.
//!
//! Polls the shared projects directory for queued jobs and runs them with
//! the real LaTeX toolchain. Pair it with an API server in `external` mode.
//!
//! | Variable                  | Default         |
//! |---------------------------|-----------------|
//! | `LATEX_FILES_DIR`         | `./latex_files` |
//! | `WORKER_POLL_INTERVAL_MS` | `1000`          |
//! | `LATEX_TIMEOUT_SECS`      | `120`           |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use texsync_compiler::runner::JobRunner;
use texsync_compiler::toolchain::LatexToolchain;
use texsync_compiler::worker::QueueWorker;
use texsync_store::{FsJobStore, JobStore, ProjectLayout};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "texsync_worker=debug,texsync_compiler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let files_dir = PathBuf::from(
        std::env::var("LATEX_FILES_DIR").unwrap_or_else(|_| "./latex_files".into()),
    );
    let poll_interval = Duration::from_millis(env_u64("WORKER_POLL_INTERVAL_MS", 1000)?);
    let latex_timeout = Duration::from_secs(env_u64("LATEX_TIMEOUT_SECS", 120)?);

    tokio::fs::create_dir_all(&files_dir)
        .await
        .with_context(|| format!("creating {}", files_dir.display()))?;

    let layout = ProjectLayout::new(&files_dir);
    let store: Arc<dyn JobStore> = Arc::new(FsJobStore::new(layout.clone()));
    let runner = Arc::new(JobRunner::new(
        store,
        layout,
        Arc::new(LatexToolchain::new(latex_timeout)),
    ));
    let worker = QueueWorker::new(runner).with_poll_interval(poll_interval);

    tracing::info!(files_dir = %files_dir.display(), "Worker starting");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    worker.run(cancel).await;
    tracing::info!("Worker stopped");
    Ok(())
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
        () = ctrl_c => tracing::info!("Received SIGINT, stopping worker"),
        () = terminate => tracing::info!("Received SIGTERM, stopping worker"),
    }
}
