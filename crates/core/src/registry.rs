//! Per-project revision and buffer bookkeeping.
//!
//! [`RevisionRegistry`] is the only shared mutable structure on the compile
//! path. It is created once at startup and handed to every session handler
//! and executor through an `Arc`.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::revision::Revision;

#[derive(Debug, Default)]
struct ProjectState {
    latest: Option<Revision>,
    buffers: HashMap<String, String>,
}

/// Latest accepted revision and last-known file contents, per project.
///
/// Writes are last-write-wins across connections. A single `RwLock` guards
/// every project; readers observe a write as soon as it returns.
#[derive(Debug, Default)]
pub struct RevisionRegistry {
    projects: RwLock<HashMap<String, ProjectState>>,
}

impl RevisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrite the latest revision for `project_id`.
    pub async fn set_latest_revision(&self, project_id: &str, revision: Revision) {
        let mut projects = self.projects.write().await;
        projects.entry(project_id.to_string()).or_default().latest = Some(revision);
    }

    /// Current latest revision, or [`Revision::zero`] if none was ever set.
    pub async fn latest_revision(&self, project_id: &str) -> Revision {
        self.projects
            .read()
            .await
            .get(project_id)
            .and_then(|state| state.latest.clone())
            .unwrap_or_default()
    }

    /// Unconditionally overwrite the in-memory copy of `entry_file`.
    pub async fn set_buffer(&self, project_id: &str, entry_file: &str, content: String) {
        let mut projects = self.projects.write().await;
        projects
            .entry(project_id.to_string())
            .or_default()
            .buffers
            .insert(entry_file.to_string(), content);
    }

    /// Last-known content of `entry_file`, if any docUpdate carried it.
    pub async fn buffer(&self, project_id: &str, entry_file: &str) -> Option<String> {
        self.projects
            .read()
            .await
            .get(project_id)
            .and_then(|state| state.buffers.get(entry_file).cloned())
    }

    /// Record a document update: buffer content and latest revision change
    /// together under one write lock, so no reader sees one without the other.
    pub async fn apply_doc_update(
        &self,
        project_id: &str,
        entry_file: &str,
        content: String,
        revision: Revision,
    ) {
        let mut projects = self.projects.write().await;
        let state = projects.entry(project_id.to_string()).or_default();
        state.buffers.insert(entry_file.to_string(), content);
        state.latest = Some(revision);
    }

    /// Drop all state for a deleted project.
    pub async fn forget(&self, project_id: &str) {
        self.projects.write().await.remove(project_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
