//! Queue-polling worker for out-of-process compiles.
//!
//! Scans every project's queue on a fixed interval, claims jobs oldest first
//! and runs them one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::CompileError;
use crate::runner::JobRunner;

/// Default polling interval for the worker loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct QueueWorker {
    runner: Arc<JobRunner>,
    poll_interval: Duration,
}

impl QueueWorker {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self {
            runner,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// A job in progress when cancellation fires is abandoned; its working
    /// record stays behind for inspection.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Queue worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Queue worker shutting down mid-cycle");
                            break;
                        }
                        result = self.drain_once() => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "Worker cycle failed");
                            }
                        }
                    }
                }
            }
        }
    }

    /// One cycle: run every job currently queued. Returns how many ran.
    pub async fn drain_once(&self) -> Result<usize, CompileError> {
        let pending = self.runner.store().pending().await?;
        let mut ran = 0;
        for job in pending {
            match self.runner.run_queued(&job.project_id, &job.job_id).await {
                Ok(Some(state)) => {
                    ran += 1;
                    tracing::debug!(job_id = %job.job_id, state = state.as_str(), "Job processed");
                }
                Ok(None) => {
                    tracing::debug!(job_id = %job.job_id, "Job claimed elsewhere");
                }
                Err(e) => {
                    tracing::error!(job_id = %job.job_id, error = %e, "Error processing job");
                }
            }
        }
        Ok(ran)
    }
}
