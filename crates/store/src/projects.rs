//! Project catalog: an in-memory index of `project.json` records.
//!
//! The index is filled from disk once by [`ProjectCatalog::load`]; afterwards
//! reads are served from memory and writes go to both.

use std::collections::HashMap;
use std::io::ErrorKind;

use chrono::Utc;
use texsync_core::error::CoreError;
use texsync_core::job::{DEFAULT_ENGINE, DEFAULT_ENTRY_FILE};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::layout::ProjectLayout;
use crate::models::project::{
    CreateProject, Project, ProjectListQuery, Template, DEFAULT_PROJECT_NAME,
};

#[derive(Debug)]
pub struct ProjectCatalog {
    layout: ProjectLayout,
    projects: RwLock<HashMap<String, Project>>,
}

impl ProjectCatalog {
    /// Empty catalog; nothing is read from disk.
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Build a catalog from every `<root>/<id>/project.json` on disk.
    ///
    /// Directories without metadata are skipped; unreadable metadata is
    /// logged and skipped.
    pub async fn load(layout: ProjectLayout) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(layout.root()).await?;
        let mut projects = HashMap::new();
        let mut entries = tokio::fs::read_dir(layout.root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(crate::layout::METADATA_FILE);
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Project>(&bytes) {
                Ok(project) => {
                    projects.insert(project.project_id.clone(), project);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable project metadata");
                }
            }
        }
        tracing::info!(count = projects.len(), root = %layout.root().display(), "Project catalog loaded");
        Ok(Self {
            layout,
            projects: RwLock::new(projects),
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Create the project directory tree, seed `main.tex` and register it.
    pub async fn create(&self, input: &CreateProject) -> Result<Project, StoreError> {
        let now = Utc::now();
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PROJECT_NAME);
        let project = Project {
            project_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            engine: input
                .engine
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
        };

        let id = &project.project_id;
        self.layout.ensure_project_dirs(id).await?;
        let template = Template::from_name(input.template.as_deref());
        tokio::fs::write(
            self.layout.project_dir(id).join(DEFAULT_ENTRY_FILE),
            template.source(),
        )
        .await?;
        self.persist(&project).await?;

        self.projects
            .write()
            .await
            .insert(project.project_id.clone(), project.clone());
        tracing::info!(project_id = %project.project_id, ?template, "Project created");
        Ok(project)
    }

    pub async fn get(&self, project_id: &str) -> Option<Project> {
        self.projects.read().await.get(project_id).cloned()
    }

    /// Like [`get`](Self::get) but a missing project is an error.
    pub async fn require(&self, project_id: &str) -> Result<Project, StoreError> {
        self.get(project_id).await.ok_or_else(|| {
            CoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            }
            .into()
        })
    }

    pub async fn exists(&self, project_id: &str) -> bool {
        self.projects.read().await.contains_key(project_id)
    }

    /// Newest first, filtered by name and paged.
    pub async fn list(&self, query: &ProjectListQuery) -> Vec<Project> {
        let needle = query.needle();
        let mut matching: Vec<Project> = self
            .projects
            .read()
            .await
            .values()
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let size = query.page_size();
        matching
            .into_iter()
            .skip((query.page() - 1) * size)
            .take(size)
            .collect()
    }

    /// Bump `updatedAt` after a file write.
    pub async fn touch(&self, project_id: &str) -> Result<(), StoreError> {
        let updated = {
            let mut projects = self.projects.write().await;
            match projects.get_mut(project_id) {
                Some(project) => {
                    project.updated_at = Utc::now();
                    project.clone()
                }
                None => return Ok(()),
            }
        };
        self.persist(&updated).await
    }

    /// Remove the project directory and its catalog entry.
    ///
    /// Returns `false` when the project was not known.
    pub async fn delete(&self, project_id: &str) -> Result<bool, StoreError> {
        if !self.exists(project_id).await {
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(self.layout.project_dir(project_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.projects.write().await.remove(project_id);
        tracing::info!(project_id, "Project deleted");
        Ok(true)
    }

    async fn persist(&self, project: &Project) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(project)?;
        tokio::fs::write(self.layout.metadata_file(&project.project_id), bytes).await?;
        Ok(())
    }
}
