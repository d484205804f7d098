//! Project metadata model and DTOs.

use serde::{Deserialize, Serialize};
use texsync_core::job::{DEFAULT_ENGINE, DEFAULT_ENTRY_FILE};
use texsync_core::types::{ProjectId, Timestamp};

use crate::models::file::FileInfo;

/// Name given to projects created without one.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// Contents of `<projectId>/project.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: ProjectId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_entry_file")]
    pub entry_file: String,
}

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

fn default_entry_file() -> String {
    DEFAULT_ENTRY_FILE.to_string()
}

/// DTO for creating a project. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub name: Option<String>,
    pub template: Option<String>,
    pub engine: Option<String>,
}

/// Project plus a listing of its files.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub files: Vec<FileInfo>,
}

/// `?page=&pageSize=&search=` for project listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
}

impl ProjectListQuery {
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    pub const MAX_PAGE_SIZE: usize = 100;

    /// 1-based page, never below 1.
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    /// Lower-cased, trimmed search needle; `None` when blank.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

/// Seed document for a new project's `main.tex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Article,
    Book,
    Empty,
}

impl Template {
    /// Unknown names fall back to [`Template::Article`].
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("book") => Template::Book,
            Some("empty") => Template::Empty,
            _ => Template::Article,
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Template::Article => {
                "\\documentclass{article}\n\\begin{document}\nHello, LaTeX.\n\\end{document}\n"
            }
            Template::Book => {
                "\\documentclass{book}\n\\begin{document}\n\\chapter{Title}\nHello, book.\n\\end{document}\n"
            }
            Template::Empty => "\\documentclass{article}\n\\begin{document}\n\\end{document}\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_are_case_insensitive() {
        assert_eq!(Template::from_name(Some("BOOK")), Template::Book);
        assert_eq!(Template::from_name(Some("empty")), Template::Empty);
        assert_eq!(Template::from_name(Some("poster")), Template::Article);
        assert_eq!(Template::from_name(None), Template::Article);
        assert!(Template::Book.source().contains("\\chapter{Title}"));
    }

    #[test]
    fn list_query_clamps_paging() {
        let query = ProjectListQuery {
            page: Some(0),
            page_size: Some(1000),
            search: Some("  Thesis ".into()),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), ProjectListQuery::MAX_PAGE_SIZE);
        assert_eq!(query.needle().as_deref(), Some("thesis"));
        assert_eq!(ProjectListQuery::default().needle(), None);
    }

    #[test]
    fn metadata_without_engine_uses_defaults() {
        let json = r#"{"projectId":"p","name":"n","createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.engine, "pdflatex");
        assert_eq!(project.entry_file, "main.tex");
    }
}
