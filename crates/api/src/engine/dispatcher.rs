//! Compile Dispatcher.
//!
//! `enqueue` is synchronous from the caller's point of view: it returns once
//! the job description is persisted. Execution happens elsewhere, either on a
//! tracked background task (simulate/local modes) or in the worker process
//! (external mode), and is reported only through the job's status record.
//!
//! In-process runs of one project share its directory, so they go through a
//! per-project lane and run one at a time in enqueue order. The last job
//! enqueued is always the last to write `output.pdf`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use texsync_compiler::{ExecutionMode, JobRunner};
use texsync_core::job::{CancelRequest, JobDescription};
use texsync_core::paths::normalize_relative;
use texsync_core::{Revision, RevisionRegistry};
use texsync_store::files::ProjectFiles;
use texsync_store::{JobStore, StoreError};
use tokio::sync::{mpsc, Mutex};
use tokio_util::task::TaskTracker;

/// Sender side of a project's run lane; carries job ids.
type Lane = mpsc::UnboundedSender<String>;

pub struct CompileDispatcher {
    store: Arc<dyn JobStore>,
    registry: Arc<RevisionRegistry>,
    files: ProjectFiles,
    runner: Arc<JobRunner>,
    mode: ExecutionMode,
    supersede_stale: bool,
    /// Most recently enqueued job per project.
    latest_jobs: Mutex<HashMap<String, JobDescription>>,
    lanes: Mutex<HashMap<String, Lane>>,
    tasks: TaskTracker,
}

impl CompileDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<RevisionRegistry>,
        files: ProjectFiles,
        runner: Arc<JobRunner>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            store,
            registry,
            files,
            runner,
            mode,
            supersede_stale: false,
            latest_jobs: Mutex::new(HashMap::new()),
            lanes: Mutex::new(HashMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// File a `superseded` request for a project's previous job on enqueue.
    pub fn with_supersede(mut self, enabled: bool) -> Self {
        self.supersede_stale = enabled;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Persist a job for `revision` and trigger execution.
    ///
    /// The project must exist; callers check that first. A failure to
    /// persist the description is returned. Failures during execution only
    /// ever show up in the status record.
    pub async fn enqueue(
        &self,
        project_id: &str,
        entry_file: &str,
        engine: &str,
        revision: Revision,
        requestor: &str,
    ) -> Result<JobDescription, StoreError> {
        let entry_file = normalize_relative(entry_file)?;
        let job = JobDescription::new(project_id, entry_file, engine, revision, requestor);

        // The worker process cannot see in-memory buffers.
        if self.mode == ExecutionMode::External {
            self.flush_buffer(&job).await?;
        }

        self.store.enqueue(&job).await?;
        tracing::info!(
            job_id = %job.job_id,
            project_id = %job.project_id,
            revision = %job.revision,
            entry_file = %job.entry_file,
            requestor,
            mode = self.mode.as_str(),
            "Compile job enqueued",
        );

        let previous = self
            .latest_jobs
            .lock()
            .await
            .insert(project_id.to_string(), job.clone());
        if self.supersede_stale {
            if let Some(previous) = previous {
                self.supersede(&previous, &job.revision).await;
            }
        }

        if self.mode.runs_in_process() {
            self.schedule_run(&job).await;
        }
        Ok(job)
    }

    /// Ask a queued or running job to stop.
    ///
    /// Returns `false` when the job is unknown or already finished.
    pub async fn cancel(&self, project_id: &str, job_id: &str) -> Result<bool, StoreError> {
        if let Some(record) = self.store.status(project_id, job_id).await? {
            if record.state.is_terminal() {
                return Ok(false);
            }
        } else if self.store.job(project_id, job_id).await?.is_none() {
            return Ok(false);
        }

        self.store
            .request_cancel(project_id, job_id, &CancelRequest::canceled())
            .await?;
        tracing::info!(project_id, job_id, "Compile cancel requested");
        Ok(true)
    }

    /// Cancel the project's most recently enqueued job, if still in flight.
    pub async fn cancel_latest(&self, project_id: &str) -> Result<bool, StoreError> {
        let latest = self.latest_jobs.lock().await.get(project_id).cloned();
        match latest {
            Some(job) => self.cancel(project_id, &job.job_id).await,
            None => Ok(false),
        }
    }

    /// Drop per-project bookkeeping for a deleted project.
    pub async fn forget(&self, project_id: &str) {
        self.latest_jobs.lock().await.remove(project_id);
        self.lanes.lock().await.remove(project_id);
    }

    /// Number of projects with an in-process run lane still open.
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting in-process runs and wait for the queued ones to finish.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        // Closing every lane lets its task exit once drained.
        self.lanes.lock().await.clear();
        self.tasks.close();
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }

    async fn flush_buffer(&self, job: &JobDescription) -> Result<(), StoreError> {
        if let Some(content) = self
            .registry
            .buffer(&job.project_id, &job.entry_file)
            .await
        {
            self.files
                .write(&job.project_id, &job.entry_file, &content)
                .await?;
        }
        Ok(())
    }

    async fn supersede(&self, previous: &JobDescription, by: &Revision) {
        let finished = match self
            .store
            .status(&previous.project_id, &previous.job_id)
            .await
        {
            Ok(record) => record.is_some_and(|r| r.state.is_terminal()),
            Err(e) => {
                tracing::warn!(job_id = %previous.job_id, error = %e, "Status read failed");
                false
            }
        };
        if finished {
            return;
        }

        let request = CancelRequest::superseded_by(by.clone());
        match self
            .store
            .request_cancel(&previous.project_id, &previous.job_id, &request)
            .await
        {
            Ok(()) => tracing::info!(
                job_id = %previous.job_id,
                superseded_by = %by,
                "Previous compile superseded",
            ),
            Err(e) => tracing::warn!(job_id = %previous.job_id, error = %e, "Supersede request failed"),
        }
    }

    /// Queue `job` on its project's lane, opening the lane on first use.
    async fn schedule_run(&self, job: &JobDescription) {
        let mut lanes = self.lanes.lock().await;
        if let Some(lane) = lanes.get(&job.project_id) {
            if lane.send(job.job_id.clone()).is_ok() {
                return;
            }
        }

        let (lane, jobs) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is still held here.
        let _ = lane.send(job.job_id.clone());
        lanes.insert(job.project_id.clone(), lane);
        self.spawn_lane(job.project_id.clone(), jobs);
    }

    fn spawn_lane(&self, project_id: String, mut jobs: mpsc::UnboundedReceiver<String>) {
        let runner = Arc::clone(&self.runner);
        self.tasks.spawn(async move {
            while let Some(job_id) = jobs.recv().await {
                match runner.run_queued(&project_id, &job_id).await {
                    Ok(Some(state)) => {
                        tracing::debug!(job_id = %job_id, state = state.as_str(), "In-process compile finished");
                    }
                    Ok(None) => {
                        tracing::debug!(job_id = %job_id, "Job claimed elsewhere");
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "In-process compile failed");
                    }
                }
            }
            tracing::debug!(project_id = %project_id, "Compile lane closed");
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use texsync_compiler::toolchain::{CompileInput, SimulatedToolchain, Toolchain};
    use texsync_compiler::CompileError;
    use texsync_core::error::CoreError;
    use texsync_core::job::{CancelReason, JobState};
    use texsync_store::{MemoryJobStore, ProjectLayout};

    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        layout: ProjectLayout,
        store: Arc<MemoryJobStore>,
        registry: Arc<RevisionRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            Self {
                layout: ProjectLayout::new(tmp.path()),
                _tmp: tmp,
                store: Arc::new(MemoryJobStore::new()),
                registry: Arc::new(RevisionRegistry::new()),
            }
        }

        fn dispatcher(&self, mode: ExecutionMode) -> CompileDispatcher {
            self.dispatcher_with(
                mode,
                Arc::new(SimulatedToolchain::new(Duration::from_millis(10))),
            )
        }

        fn dispatcher_with(
            &self,
            mode: ExecutionMode,
            toolchain: Arc<dyn Toolchain>,
        ) -> CompileDispatcher {
            let store: Arc<dyn JobStore> = self.store.clone();
            let runner = JobRunner::new(Arc::clone(&store), self.layout.clone(), toolchain)
                .with_cancel_poll(Duration::from_millis(10));
            CompileDispatcher::new(
                store,
                Arc::clone(&self.registry),
                ProjectFiles::new(self.layout.clone()),
                Arc::new(runner),
                mode,
            )
        }
    }

    /// Writes the job's revision as the artifact. Revision 1 is slow.
    struct RevisionStamp;

    #[async_trait]
    impl Toolchain for RevisionStamp {
        fn name(&self) -> &'static str {
            "revision-stamp"
        }

        async fn compile(&self, input: CompileInput<'_>) -> Result<(), CompileError> {
            let delay = if input.job.revision == Revision::from(1) { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            tokio::fs::write(input.project_dir.join("output.pdf"), input.job.revision.as_str())
                .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn external_mode_only_queues_and_flushes_buffer() {
        let fx = Fixture::new();
        fx.registry
            .set_buffer("p1", "main.tex", "\\documentclass{article}".into())
            .await;
        let dispatcher = fx.dispatcher(ExecutionMode::External);

        let job = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(3), "test")
            .await
            .unwrap();

        assert_eq!(job.revision, Revision::from(3));
        assert_eq!(fx.store.job_count().await, 1);
        assert_eq!(dispatcher.running_tasks(), 0);
        let on_disk = std::fs::read_to_string(fx.layout.project_dir("p1").join("main.tex")).unwrap();
        assert_eq!(on_disk, "\\documentclass{article}");
    }

    #[tokio::test]
    async fn store_failure_is_returned_to_caller() {
        let fx = Fixture::new();
        fx.store.fail_writes(true);
        let dispatcher = fx.dispatcher(ExecutionMode::External);

        let result = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(1), "test")
            .await;

        assert_matches!(result, Err(StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn entry_outside_project_is_rejected() {
        let fx = Fixture::new();
        let dispatcher = fx.dispatcher(ExecutionMode::External);

        let result = dispatcher
            .enqueue("p1", "../main.tex", "pdflatex", Revision::from(1), "test")
            .await;

        assert_matches!(result, Err(StoreError::Core(CoreError::InvalidPath(_))));
        assert_eq!(fx.store.job_count().await, 0);
    }

    #[tokio::test]
    async fn simulate_mode_runs_job_to_success() {
        let fx = Fixture::new();
        fx.layout.ensure_project_dirs("p1").await.unwrap();
        let dispatcher = fx.dispatcher(ExecutionMode::Simulate);

        let job = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(1), "test")
            .await
            .unwrap();
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        let record = fx.store.status("p1", &job.job_id).await.unwrap().unwrap();
        assert_eq!(record.state, JobState::Success);
        assert!(fx.layout.output_pdf("p1").exists());
    }

    #[tokio::test]
    async fn slow_older_compile_never_overwrites_newer_output() {
        let fx = Fixture::new();
        fx.layout.ensure_project_dirs("p1").await.unwrap();
        let dispatcher = fx.dispatcher_with(ExecutionMode::Local, Arc::new(RevisionStamp));

        let older = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(1), "test")
            .await
            .unwrap();
        let newer = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(2), "test")
            .await
            .unwrap();
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        let output = std::fs::read_to_string(fx.layout.output_pdf("p1")).unwrap();
        assert_eq!(output, "2");

        let older = fx.store.status("p1", &older.job_id).await.unwrap().unwrap();
        let newer = fx.store.status("p1", &newer.job_id).await.unwrap().unwrap();
        assert_eq!(older.state, JobState::Success);
        assert_eq!(newer.state, JobState::Success);
        assert!(newer.started_at >= older.finished_at);
    }

    #[tokio::test]
    async fn projects_compile_independently() {
        let fx = Fixture::new();
        fx.layout.ensure_project_dirs("p1").await.unwrap();
        fx.layout.ensure_project_dirs("p2").await.unwrap();
        let dispatcher = fx.dispatcher(ExecutionMode::Simulate);

        for project in ["p1", "p2"] {
            dispatcher
                .enqueue(project, "main.tex", "pdflatex", Revision::from(1), "test")
                .await
                .unwrap();
        }
        assert_eq!(dispatcher.running_tasks(), 2);
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert!(fx.layout.output_pdf("p1").exists());
        assert!(fx.layout.output_pdf("p2").exists());
    }

    #[tokio::test]
    async fn supersede_marks_previous_job() {
        let fx = Fixture::new();
        let dispatcher = fx.dispatcher(ExecutionMode::External).with_supersede(true);

        let first = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(1), "test")
            .await
            .unwrap();
        dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(2), "test")
            .await
            .unwrap();

        let request = fx
            .store
            .cancel_request("p1", &first.job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.reason, CancelReason::Superseded);
        assert_eq!(request.superseded_by, Some(Revision::from(2)));
    }

    #[tokio::test]
    async fn cancel_unknown_or_latest_job() {
        let fx = Fixture::new();
        let dispatcher = fx.dispatcher(ExecutionMode::External);

        assert!(!dispatcher.cancel("p1", "nope").await.unwrap());
        assert!(!dispatcher.cancel_latest("p1").await.unwrap());

        let job = dispatcher
            .enqueue("p1", "main.tex", "pdflatex", Revision::from(1), "test")
            .await
            .unwrap();
        assert!(dispatcher.cancel_latest("p1").await.unwrap());
        let request = fx.store.cancel_request("p1", &job.job_id).await.unwrap();
        assert_matches!(request, Some(r) if r.reason == CancelReason::Canceled);
    }
}
