//! Sandboxed access to project source files.
//!
//! Every client path goes through [`safe_join`] first, so reads and writes
//! never leave the project directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use texsync_core::error::CoreError;
use texsync_core::paths::{normalize_relative, safe_join};
use texsync_core::Revision;

use crate::error::StoreError;
use crate::layout::ProjectLayout;
use crate::models::file::{FileContent, FileInfo, FileKind, PutFile, SavedFile};

#[derive(Debug, Clone)]
pub struct ProjectFiles {
    layout: ProjectLayout,
}

impl ProjectFiles {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    /// Resolve a client path to an absolute path inside the project.
    pub fn resolve(&self, project_id: &str, requested: &str) -> Result<PathBuf, StoreError> {
        Ok(safe_join(&self.layout.project_dir(project_id), requested)?)
    }

    pub async fn read(&self, project_id: &str, requested: &str) -> Result<FileContent, StoreError> {
        let path = self.resolve(project_id, requested)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CoreError::NotFound {
                    entity: "File",
                    id: requested.to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(FileContent {
            path: normalize_relative(requested)?,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Write one file, creating parent directories as needed.
    pub async fn write(
        &self,
        project_id: &str,
        requested: &str,
        content: &str,
    ) -> Result<SavedFile, StoreError> {
        let path = self.resolve(project_id, requested)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(SavedFile {
            path: normalize_relative(requested)?,
            bytes: content.len(),
        })
    }

    /// Record the project's latest revision in `compile/latest.token`.
    pub async fn write_latest_token(
        &self,
        project_id: &str,
        revision: &Revision,
    ) -> Result<(), StoreError> {
        let path = self.layout.latest_token_file(project_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, revision.as_str()).await?;
        Ok(())
    }

    /// Write a batch of files. Every path is validated before anything is
    /// written, so an invalid path leaves the project untouched.
    pub async fn write_all(
        &self,
        project_id: &str,
        files: &[PutFile],
    ) -> Result<Vec<SavedFile>, StoreError> {
        if files.is_empty() {
            return Err(CoreError::Validation("No files to save".into()).into());
        }
        for file in files {
            normalize_relative(&file.path)?;
        }
        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            saved.push(self.write(project_id, &file.path, &file.content).await?);
        }
        Ok(saved)
    }

    /// Recursive listing of the project directory, sorted by path.
    pub async fn tree(&self, project_id: &str) -> Result<Vec<FileInfo>, StoreError> {
        let root = self.layout.project_dir(project_id);
        let mut entries = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut read = match tokio::fs::read_dir(&dir).await {
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = read.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                let Some(rel) = relative_slash_path(&root, &path) else {
                    continue;
                };
                if meta.is_dir() {
                    pending.push(path);
                    entries.push(FileInfo {
                        path: rel,
                        kind: FileKind::Dir,
                        size: None,
                        updated_at: None,
                    });
                } else {
                    entries.push(FileInfo {
                        path: rel,
                        kind: FileKind::File,
                        size: Some(meta.len()),
                        updated_at: meta.modified().ok().map(DateTime::<Utc>::from),
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
