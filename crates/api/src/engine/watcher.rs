//! Status Watcher: follows one job's status record and reports each
//! transition on the connection that requested the compile.
//!
//! Events per job, in order:
//!
//! ```text
//! compileStarted     once, when the job is first seen running or finished
//! compileProgress    while running, whenever the log tail changed (coalesced)
//! compileSucceeded | compileFailed | compileCanceled   exactly once
//! ```
//!
//! Terminal records never change, so the first terminal read ends the watch.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use texsync_core::job::{JobDescription, JobState, JobStatusRecord};
use texsync_store::jobs::DEFAULT_LOG_TAIL_BYTES;
use texsync_store::{JobStore, ProjectLayout};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ws::protocol::{Outbound, ServerEvent};

/// Error reported when the watch deadline passes first.
pub const WATCH_TIMEOUT_ERROR: &str = "timed out waiting for compile result";

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A terminal record was observed and reported.
    Finished(JobState),
    /// The deadline passed; a synthetic `compileFailed` was sent.
    TimedOut,
    /// The owning connection's scope was cancelled.
    Canceled,
    /// The outbound channel closed.
    Disconnected,
}

pub struct StatusWatcher {
    store: Arc<dyn JobStore>,
    job: JobDescription,
    outbound: mpsc::UnboundedSender<Message>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl StatusWatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        job: JobDescription,
        outbound: mpsc::UnboundedSender<Message>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            job,
            outbound,
            poll_interval,
            timeout: None,
        }
    }

    /// Give up after `timeout`; `None` polls until cancelled.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll until a terminal record, the deadline, cancellation or a closed
    /// channel, whichever comes first.
    pub async fn run(self, cancel: CancellationToken) -> WatchOutcome {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut started = false;
        let mut last_tail = String::new();

        tracing::debug!(job_id = %self.job.job_id, "Status watcher started");

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break WatchOutcome::Canceled,
                _ = ticker.tick() => {}
            }
            if self.outbound.is_closed() {
                break WatchOutcome::Disconnected;
            }

            let record = match self
                .store
                .status(&self.job.project_id, &self.job.job_id)
                .await
            {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(job_id = %self.job.job_id, error = %e, "Status read failed");
                    None
                }
            };

            if let Some(record) = record {
                if !started && record.state != JobState::Canceled && record.state != JobState::Superseded {
                    started = true;
                    let started_at = record.started_at.unwrap_or_else(Utc::now);
                    if !self.emit(ServerEvent::CompileStarted {
                        job_id: self.job.job_id.clone(),
                        revision: self.job.revision.clone(),
                        started_at,
                    }) {
                        break WatchOutcome::Disconnected;
                    }
                }

                if record.state.is_terminal() {
                    if !self.emit(self.terminal_event(&record)) {
                        break WatchOutcome::Disconnected;
                    }
                    break WatchOutcome::Finished(record.state);
                }

                if !self.report_progress(&mut last_tail).await {
                    break WatchOutcome::Disconnected;
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(job_id = %self.job.job_id, "Status watcher deadline passed");
                self.emit(ServerEvent::CompileFailed {
                    job_id: self.job.job_id.clone(),
                    revision: self.job.revision.clone(),
                    error: WATCH_TIMEOUT_ERROR.to_string(),
                    log_tail: None,
                    log_url: ProjectLayout::log_url(&self.job.project_id, &self.job.job_id),
                    finished_at: Utc::now(),
                    duration_ms: None,
                });
                break WatchOutcome::TimedOut;
            }
        };

        tracing::debug!(job_id = %self.job.job_id, ?outcome, "Status watcher stopped");
        outcome
    }

    /// Send a progress event when the log grew. Best effort; returns `false`
    /// only when the channel is gone.
    async fn report_progress(&self, last_tail: &mut String) -> bool {
        let tail = match self
            .store
            .log_tail(&self.job.project_id, &self.job.job_id, DEFAULT_LOG_TAIL_BYTES)
            .await
        {
            Ok(tail) => tail,
            Err(_) => return true,
        };
        if tail.is_empty() || tail == *last_tail {
            return true;
        }
        let message = tail
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .to_string();
        *last_tail = tail.clone();
        self.emit(ServerEvent::CompileProgress {
            job_id: self.job.job_id.clone(),
            revision: self.job.revision.clone(),
            message,
            log_tail: tail,
        })
    }

    fn terminal_event(&self, record: &JobStatusRecord) -> ServerEvent {
        let job_id = self.job.job_id.clone();
        let revision = self.job.revision.clone();
        let finished_at = record.finished_at.unwrap_or_else(Utc::now);
        match record.state {
            JobState::Success => ServerEvent::CompileSucceeded {
                job_id,
                revision,
                pdf_url: ProjectLayout::output_url(&self.job.project_id),
                output_path: ProjectLayout::output_url(&self.job.project_id),
                finished_at,
                duration_ms: record.duration_ms,
            },
            JobState::Canceled | JobState::Superseded => ServerEvent::CompileCanceled {
                job_id,
                revision,
                reason: record.state.as_str(),
                superseded_by_revision: record.superseded_by.clone(),
                finished_at,
            },
            // Running never reaches here.
            JobState::Failed | JobState::Running => ServerEvent::CompileFailed {
                log_url: ProjectLayout::log_url(&self.job.project_id, &job_id),
                job_id,
                revision,
                error: record
                    .error
                    .clone()
                    .unwrap_or_else(|| "Compilation failed".to_string()),
                log_tail: record.log_tail.clone(),
                finished_at,
                duration_ms: record.duration_ms,
            },
        }
    }

    fn emit(&self, event: ServerEvent) -> bool {
        self.outbound
            .send(Outbound::new(&self.job.project_id, &event).to_message())
            .is_ok()
    }
}
