//! Lifecycle of one compile job.
//!
//! ```text
//! claimed ──cancel pending──────────────────────────▶ canceled | superseded
//!    │
//!    ▼
//! running ──toolchain ok──▶ (cancel pending?) ──no──▶ success
//!    │                            └──yes───────────▶ canceled | superseded
//!    ├──toolchain error───────────────────────────▶ failed (error + logTail)
//!    ├──store error───────────────────────────────▶ failed (best effort), Err
//!    └──cancel observed mid-run (engine killed)───▶ canceled | superseded
//! ```
//!
//! The runner is the single writer of the job's status record. Once a job is
//! `running` it always gets a terminal record unless the store refuses it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use texsync_core::job::{CancelRequest, JobDescription, JobState, JobStatusRecord};
use texsync_core::RevisionRegistry;
use texsync_store::jobs::DEFAULT_LOG_TAIL_BYTES;
use texsync_store::layout::OUTPUT_PDF;
use texsync_store::{JobStore, ProjectLayout, StoreError};

use crate::error::CompileError;
use crate::toolchain::{CompileInput, Toolchain};

/// How often a running job checks for a cancel request.
const DEFAULT_CANCEL_POLL: Duration = Duration::from_millis(250);

/// Source of unsaved editor content, consulted before each compile.
#[async_trait]
pub trait BufferSource: Send + Sync {
    async fn buffer(&self, project_id: &str, entry_file: &str) -> Option<String>;
}

#[async_trait]
impl BufferSource for RevisionRegistry {
    async fn buffer(&self, project_id: &str, entry_file: &str) -> Option<String> {
        RevisionRegistry::buffer(self, project_id, entry_file).await
    }
}

/// Append-only handle on one job's log.
pub struct JobLog {
    store: Arc<dyn JobStore>,
    project_id: String,
    job_id: String,
}

impl JobLog {
    pub fn new(store: Arc<dyn JobStore>, job: &JobDescription) -> Self {
        Self {
            store,
            project_id: job.project_id.clone(),
            job_id: job.job_id.clone(),
        }
    }

    pub async fn append(&self, text: &str) -> Result<(), CompileError> {
        self.store
            .append_log(&self.project_id, &self.job_id, text)
            .await?;
        Ok(())
    }
}

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    layout: ProjectLayout,
    toolchain: Arc<dyn Toolchain>,
    buffers: Option<Arc<dyn BufferSource>>,
    cancel_poll: Duration,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, layout: ProjectLayout, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            store,
            layout,
            toolchain,
            buffers: None,
            cancel_poll: DEFAULT_CANCEL_POLL,
        }
    }

    /// Compile unsaved buffers from `buffers` instead of the on-disk entry.
    pub fn with_buffers(mut self, buffers: Arc<dyn BufferSource>) -> Self {
        self.buffers = Some(buffers);
        self
    }

    pub fn with_cancel_poll(mut self, interval: Duration) -> Self {
        self.cancel_poll = interval;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Claim a queued job and run it. `None` if another runner claimed it.
    pub async fn run_queued(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobState>, CompileError> {
        match self.store.claim(project_id, job_id).await? {
            Some(job) => self.run(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drive a claimed job to a terminal status record and release it.
    pub async fn run(&self, job: JobDescription) -> Result<JobState, CompileError> {
        let result = self.execute(&job).await;
        if let Err(e) = self.store.release(&job.project_id, &job.job_id).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "Failed to release job");
        }
        if let Err(e) = self.store.clear_cancel(&job.project_id, &job.job_id).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "Failed to clear cancel request");
        }
        result
    }

    async fn execute(&self, job: &JobDescription) -> Result<JobState, CompileError> {
        if let Some(request) = self
            .store
            .cancel_request(&job.project_id, &job.job_id)
            .await?
        {
            tracing::info!(job_id = %job.job_id, reason = ?request.reason, "Job canceled before start");
            return self.finish_canceled(job, None, request).await;
        }

        let started_at = Utc::now();
        match self
            .store
            .write_status(&JobStatusRecord::running(job, started_at))
            .await
        {
            Ok(()) => {}
            // Someone already finished this job; nothing left to do.
            Err(StoreError::TerminalState { state, .. }) => {
                tracing::warn!(job_id = %job.job_id, state, "Job already terminal, skipping");
                return Ok(self
                    .store
                    .status(&job.project_id, &job.job_id)
                    .await?
                    .map(|r| r.state)
                    .unwrap_or(JobState::Failed));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            job_id = %job.job_id,
            project_id = %job.project_id,
            revision = %job.revision,
            toolchain = self.toolchain.name(),
            "Compile started",
        );

        match self.compile_running(job, started_at).await {
            Ok(state) => Ok(state),
            Err(e) => {
                self.record_failure(job, started_at, &e).await;
                Err(e)
            }
        }
    }

    /// Best-effort `failed` record for a job whose run broke down.
    async fn record_failure(
        &self,
        job: &JobDescription,
        started_at: chrono::DateTime<Utc>,
        error: &CompileError,
    ) {
        let tail = self
            .store
            .log_tail(&job.project_id, &job.job_id, DEFAULT_LOG_TAIL_BYTES)
            .await
            .unwrap_or_default();
        let record = JobStatusRecord::finished(job, JobState::Failed, Some(started_at), Utc::now())
            .with_failure(error.to_string(), tail);
        match self.store.write_status(&record).await {
            Ok(()) => tracing::warn!(job_id = %job.job_id, error = %error, "Compile aborted"),
            Err(e) => tracing::error!(
                job_id = %job.job_id,
                error = %error,
                store_error = %e,
                "Failed to record aborted compile",
            ),
        }
    }

    async fn compile_running(
        &self,
        job: &JobDescription,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<JobState, CompileError> {
        let log = JobLog::new(Arc::clone(&self.store), job);
        log.append(&format!(
            "LaTeX compilation started at {}\nJob ID: {}\nProject: {}\nRevision: {}\nEngine: {}\nEntry file: {}\n\n",
            started_at.to_rfc3339(),
            job.job_id,
            job.project_id,
            job.revision,
            job.engine,
            job.entry_file,
        ))
        .await?;

        let buffer = match &self.buffers {
            Some(buffers) => buffers.buffer(&job.project_id, &job.entry_file).await,
            None => None,
        };
        let project_dir = self.layout.project_dir(&job.project_id);
        let input = CompileInput {
            job,
            project_dir: &project_dir,
            buffer: buffer.as_deref(),
            log: &log,
        };

        // Dropping the compile future kills a running engine.
        let outcome = tokio::select! {
            result = self.toolchain.compile(input) => Ok(result),
            request = self.wait_for_cancel(job) => Err(request),
        };

        match outcome {
            Ok(Ok(())) => {
                if let Some(request) = self
                    .store
                    .cancel_request(&job.project_id, &job.job_id)
                    .await?
                {
                    return self.finish_canceled(job, Some(started_at), request).await;
                }
                let record =
                    JobStatusRecord::finished(job, JobState::Success, Some(started_at), Utc::now())
                        .with_output(OUTPUT_PDF);
                self.store.write_status(&record).await?;
                tracing::info!(job_id = %job.job_id, duration_ms = ?record.duration_ms, "Compile succeeded");
                Ok(JobState::Success)
            }
            Ok(Err(CompileError::Store(e))) => Err(CompileError::Store(e)),
            Ok(Err(e)) => {
                log.append(&format!("ERROR: {e}\n")).await?;
                let tail = self
                    .store
                    .log_tail(&job.project_id, &job.job_id, DEFAULT_LOG_TAIL_BYTES)
                    .await?;
                let record =
                    JobStatusRecord::finished(job, JobState::Failed, Some(started_at), Utc::now())
                        .with_failure(e.to_string(), tail);
                self.store.write_status(&record).await?;
                tracing::info!(job_id = %job.job_id, error = %e, "Compile failed");
                Ok(JobState::Failed)
            }
            Err(request) => {
                log.append("\n--- COMPILATION CANCELLED ---\n").await?;
                self.finish_canceled(job, Some(started_at), request).await
            }
        }
    }

    async fn finish_canceled(
        &self,
        job: &JobDescription,
        started_at: Option<chrono::DateTime<Utc>>,
        request: CancelRequest,
    ) -> Result<JobState, CompileError> {
        let state = request.reason.terminal_state();
        let record = JobStatusRecord::finished(job, state, started_at, Utc::now())
            .with_superseded_by(request.superseded_by);
        self.store.write_status(&record).await?;
        tracing::info!(job_id = %job.job_id, state = state.as_str(), "Compile stopped");
        Ok(state)
    }

    /// Resolves once a cancel request for `job` appears.
    async fn wait_for_cancel(&self, job: &JobDescription) -> CancelRequest {
        let mut ticker = tokio::time::interval(self.cancel_poll);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.store.cancel_request(&job.project_id, &job.job_id).await {
                Ok(Some(request)) => return request,
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(job_id = %job.job_id, error = %e, "Cancel check failed");
                }
            }
        }
    }
}
