//! In-memory [`JobStore`], used by tests and single-process setups.
//!
//! Writes can be made to fail on demand with [`MemoryJobStore::fail_writes`],
//! which is how the dispatch-error path is exercised, and log appends with
//! [`MemoryJobStore::fail_log_appends`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use texsync_core::job::{CancelRequest, JobDescription, JobStatusRecord};
use tokio::sync::Mutex;

use super::{guard_transition, tail_of, JobStore};
use crate::error::StoreError;

type Key = (String, String);

fn key(project_id: &str, job_id: &str) -> Key {
    (project_id.to_string(), job_id.to_string())
}

#[derive(Debug, Default)]
struct MemoryState {
    queued: HashMap<Key, JobDescription>,
    working: HashMap<Key, JobDescription>,
    statuses: HashMap<Key, JobStatusRecord>,
    logs: HashMap<Key, String>,
    cancels: HashMap<Key, CancelRequest>,
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
    fail_log_appends: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `enqueue` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `append_log` fail (or succeed again).
    pub fn fail_log_appends(&self, fail: bool) {
        self.fail_log_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of jobs ever enqueued and not yet released.
    pub async fn job_count(&self) -> usize {
        let state = self.state.lock().await;
        state.queued.len() + state.working.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(&self, job: &JobDescription) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes are disabled".into()));
        }
        self.state
            .lock()
            .await
            .queued
            .insert(key(&job.project_id, &job.job_id), job.clone());
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<JobDescription>, StoreError> {
        let mut jobs: Vec<_> = self.state.lock().await.queued.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn claim(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError> {
        let mut state = self.state.lock().await;
        let k = key(project_id, job_id);
        Ok(state.queued.remove(&k).map(|job| {
            state.working.insert(k, job.clone());
            job
        }))
    }

    async fn release(&self, project_id: &str, job_id: &str) -> Result<(), StoreError> {
        self.state.lock().await.working.remove(&key(project_id, job_id));
        Ok(())
    }

    async fn job(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError> {
        let state = self.state.lock().await;
        let k = key(project_id, job_id);
        Ok(state.queued.get(&k).or_else(|| state.working.get(&k)).cloned())
    }

    async fn write_status(&self, record: &JobStatusRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let k = key(&record.project_id, &record.job_id);
        guard_transition(state.statuses.get(&k), record)?;
        state.statuses.insert(k, record.clone());
        Ok(())
    }

    async fn status(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobStatusRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .statuses
            .get(&key(project_id, job_id))
            .cloned())
    }

    async fn append_log(
        &self,
        project_id: &str,
        job_id: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        if self.fail_log_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("log writes are disabled".into()));
        }
        self.state
            .lock()
            .await
            .logs
            .entry(key(project_id, job_id))
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn log_tail(
        &self,
        project_id: &str,
        job_id: &str,
        max_bytes: usize,
    ) -> Result<String, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .logs
            .get(&key(project_id, job_id))
            .map(|log| tail_of(log, max_bytes))
            .unwrap_or_default())
    }

    async fn request_cancel(
        &self,
        project_id: &str,
        job_id: &str,
        request: &CancelRequest,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .cancels
            .insert(key(project_id, job_id), request.clone());
        Ok(())
    }

    async fn cancel_request(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<CancelRequest>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .cancels
            .get(&key(project_id, job_id))
            .cloned())
    }

    async fn clear_cancel(&self, project_id: &str, job_id: &str) -> Result<(), StoreError> {
        self.state.lock().await.cancels.remove(&key(project_id, job_id));
        Ok(())
    }
}
