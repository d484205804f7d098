//! Filesystem-backed [`JobStore`].
//!
//! Each record is a small JSON file in the project's `compile/` namespace
//! (see [`ProjectLayout`]). JSON records are written to a temporary file and
//! renamed into place so pollers never read a half-written record.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use texsync_core::job::{CancelReason, CancelRequest, JobDescription, JobStatusRecord};
use tokio::io::AsyncWriteExt;

use super::{guard_transition, tail_of, JobStore};
use crate::error::StoreError;
use crate::layout::ProjectLayout;

/// Job store rooted at the projects directory.
#[derive(Debug, Clone)]
pub struct FsJobStore {
    layout: ProjectLayout,
}

impl FsJobStore {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn enqueue(&self, job: &JobDescription) -> Result<(), StoreError> {
        let path = self.layout.queue_file(&job.project_id, &job.job_id);
        write_json_atomic(&path, job).await
    }

    async fn pending(&self) -> Result<Vec<JobDescription>, StoreError> {
        let mut jobs = Vec::new();
        let mut projects = match tokio::fs::read_dir(self.layout.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(e.into()),
        };

        while let Some(project) = projects.next_entry().await? {
            if !project.file_type().await?.is_dir() {
                continue;
            }
            let queue_dir = project.path().join("compile").join("queue");
            let mut entries = match tokio::fs::read_dir(&queue_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_json::<JobDescription>(&path).await {
                    Ok(Some(job)) => jobs.push(job),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Removing unreadable job file");
                        remove_if_exists(&path).await?;
                    }
                }
            }
        }

        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    async fn claim(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError> {
        let queued = self.layout.queue_file(project_id, job_id);
        let working = self.layout.working_file(project_id, job_id);
        tokio::fs::create_dir_all(self.layout.working_dir(project_id)).await?;

        // rename is atomic: exactly one claimant wins.
        match tokio::fs::rename(&queued, &working).await {
            Ok(()) => read_json(&working).await,
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&self, project_id: &str, job_id: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.layout.working_file(project_id, job_id)).await
    }

    async fn job(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobDescription>, StoreError> {
        if let Some(job) = read_json(&self.layout.queue_file(project_id, job_id)).await? {
            return Ok(Some(job));
        }
        read_json(&self.layout.working_file(project_id, job_id)).await
    }

    async fn write_status(&self, record: &JobStatusRecord) -> Result<(), StoreError> {
        let path = self.layout.status_file(&record.project_id, &record.job_id);
        let current = read_json::<JobStatusRecord>(&path).await?;
        guard_transition(current.as_ref(), record)?;
        write_json_atomic(&path, record).await
    }

    async fn status(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<JobStatusRecord>, StoreError> {
        read_json(&self.layout.status_file(project_id, job_id)).await
    }

    async fn append_log(
        &self,
        project_id: &str,
        job_id: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let path = self.layout.log_file(project_id, job_id);
        ensure_parent(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn log_tail(
        &self,
        project_id: &str,
        job_id: &str,
        max_bytes: usize,
    ) -> Result<String, StoreError> {
        match tokio::fs::read(self.layout.log_file(project_id, job_id)).await {
            Ok(bytes) => Ok(tail_of(&String::from_utf8_lossy(&bytes), max_bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn request_cancel(
        &self,
        project_id: &str,
        job_id: &str,
        request: &CancelRequest,
    ) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.cancel_file(project_id, job_id), request).await
    }

    async fn cancel_request(
        &self,
        project_id: &str,
        job_id: &str,
    ) -> Result<Option<CancelRequest>, StoreError> {
        let path = self.layout.cancel_file(project_id, job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Markers written by other tools may hold only a timestamp; the
        // marker's existence alone means "canceled".
        Ok(Some(serde_json::from_slice(&bytes).unwrap_or(CancelRequest {
            reason: CancelReason::Canceled,
            superseded_by: None,
            requested_at: chrono::Utc::now(),
        })))
    }

    async fn clear_cancel(&self, project_id: &str, job_id: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.layout.cancel_file(project_id, job_id)).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    ensure_parent(path).await?;
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
