//! Job Store: write a job description once, then poll its status record.
//!
//! Status records are single-writer (the executing worker) and multi-reader
//! (any number of watchers). Once a record is terminal, every further write
//! for that job is refused with [`StoreError::TerminalState`].

mod fs;
mod memory;

use async_trait::async_trait;
use texsync_core::job::{CancelRequest, JobDescription, JobStatusRecord};

use crate::error::StoreError;

pub use fs::FsJobStore;
pub use memory::MemoryJobStore;

/// Maximum bytes of log text returned as a tail.
pub const DEFAULT_LOG_TAIL_BYTES: usize = 4096;

/// Storage contract shared by the dispatcher, executors and watchers.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job description in the project's queue.
    async fn enqueue(&self, job: &JobDescription) -> Result<(), StoreError>;

    /// All queued (unclaimed) jobs across projects, oldest first.
    async fn pending(&self) -> Result<Vec<JobDescription>, StoreError>;

    /// Move a queued job to the working set. `None` if another worker got it.
    async fn claim(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError>;

    /// Drop a job from the working set once its terminal status is written.
    async fn release(&self, project_id: &str, job_id: &str) -> Result<(), StoreError>;

    /// Description of a queued or working job.
    async fn job(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError>;

    /// Write a status record, refusing to leave a terminal state.
    async fn write_status(&self, record: &JobStatusRecord) -> Result<(), StoreError>;

    /// Current status record; `None` while the job is still queued.
    async fn status(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobStatusRecord>, StoreError>;

    /// Append text to the job's log.
    async fn append_log(&self, project_id: &str, job_id: &str, text: &str)
        -> Result<(), StoreError>;

    /// At most the last `max_bytes` of the job's log (empty if none).
    async fn log_tail(
        &self,
        project_id: &str,
        job_id: &str,
        max_bytes: usize,
    ) -> Result<String, StoreError>;

    /// File a cancel request for a job.
    async fn request_cancel(
        &self,
        project_id: &str,
        job_id: &str,
        request: &CancelRequest,
    ) -> Result<(), StoreError>;

    /// Pending cancel request for a job, if any.
    async fn cancel_request(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<CancelRequest>, StoreError>;

    /// Remove a cancel request once it has been honoured.
    async fn clear_cancel(&self, project_id: &str, job_id: &str) -> Result<(), StoreError>;
}

/// Refuse a status write when the stored record is already terminal.
pub(crate) fn guard_transition(
    current: Option<&JobStatusRecord>,
    next: &JobStatusRecord,
) -> Result<(), StoreError> {
    match current {
        Some(existing) if existing.state.is_terminal() => Err(StoreError::TerminalState {
            job_id: next.job_id.clone(),
            state: existing.state.as_str(),
        }),
        _ => Ok(()),
    }
}

/// Keep at most the last `max_bytes` of `text`, on a char boundary.
pub(crate) fn tail_of(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
