//! On-disk layout of a project workspace.
//!
//! ```text
//! <root>/<projectId>/
//!   project.json                 metadata
//!   main.tex, assets/, ...       sources
//!   output.pdf                   latest artifact
//!   compile/queue/<jobId>.json   job descriptions awaiting a worker
//!   compile/working/<jobId>.json claimed job descriptions
//!   compile/status/<jobId>.json  status records
//!   compile/logs/<jobId>.txt     compiler logs
//!   compile/<jobId>.cancel       cancel requests
//!   compile/latest.token         last revision received over the socket
//! ```

use std::path::{Path, PathBuf};

/// Metadata file name inside each project directory.
pub const METADATA_FILE: &str = "project.json";

/// Well-known artifact name every successful compile produces.
pub const OUTPUT_PDF: &str = "output.pdf";

/// Compile bookkeeping directory, relative to the project directory.
pub const COMPILE_DIR: &str = "compile";

/// Subdirectories of [`COMPILE_DIR`] created with every project.
pub const COMPILE_SUBDIRS: &[&str] = &["queue", "working", "logs", "status"];

/// Resolves every path the store touches from the workspace root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    pub fn metadata_file(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(METADATA_FILE)
    }

    pub fn output_pdf(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(OUTPUT_PDF)
    }

    pub fn compile_dir(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(COMPILE_DIR)
    }

    pub fn queue_dir(&self, project_id: &str) -> PathBuf {
        self.compile_dir(project_id).join("queue")
    }

    pub fn working_dir(&self, project_id: &str) -> PathBuf {
        self.compile_dir(project_id).join("working")
    }

    pub fn status_dir(&self, project_id: &str) -> PathBuf {
        self.compile_dir(project_id).join("status")
    }

    pub fn logs_dir(&self, project_id: &str) -> PathBuf {
        self.compile_dir(project_id).join("logs")
    }

    pub fn queue_file(&self, project_id: &str, job_id: &str) -> PathBuf {
        self.queue_dir(project_id).join(format!("{job_id}.json"))
    }

    pub fn working_file(&self, project_id: &str, job_id: &str) -> PathBuf {
        self.working_dir(project_id).join(format!("{job_id}.json"))
    }

    pub fn status_file(&self, project_id: &str, job_id: &str) -> PathBuf {
        self.status_dir(project_id).join(format!("{job_id}.json"))
    }

    pub fn log_file(&self, project_id: &str, job_id: &str) -> PathBuf {
        self.logs_dir(project_id).join(format!("{job_id}.txt"))
    }

    pub fn cancel_file(&self, project_id: &str, job_id: &str) -> PathBuf {
        self.compile_dir(project_id).join(format!("{job_id}.cancel"))
    }

    pub fn latest_token_file(&self, project_id: &str) -> PathBuf {
        self.compile_dir(project_id).join("latest.token")
    }

    /// Public URL of the latest artifact, served by the static file route.
    pub fn output_url(project_id: &str) -> String {
        format!("/files/{project_id}/{OUTPUT_PDF}")
    }

    /// Public URL of a job's log file.
    pub fn log_url(project_id: &str, job_id: &str) -> String {
        format!("/files/{project_id}/{COMPILE_DIR}/logs/{job_id}.txt")
    }

    /// Create the project directory and its compile bookkeeping directories.
    pub async fn ensure_project_dirs(&self, project_id: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.project_dir(project_id).join("assets")).await?;
        for sub in COMPILE_SUBDIRS {
            tokio::fs::create_dir_all(self.compile_dir(project_id).join(sub)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_the_project() {
        let layout = ProjectLayout::new("/data");
        assert_eq!(
            layout.status_file("p", "j"),
            Path::new("/data/p/compile/status/j.json")
        );
        assert_eq!(layout.cancel_file("p", "j"), Path::new("/data/p/compile/j.cancel"));
        assert_eq!(layout.log_file("p", "j"), Path::new("/data/p/compile/logs/j.txt"));
        assert_eq!(
            layout.latest_token_file("p"),
            Path::new("/data/p/compile/latest.token")
        );
    }

    #[test]
    fn public_urls_point_at_static_route() {
        assert_eq!(ProjectLayout::output_url("p"), "/files/p/output.pdf");
        assert_eq!(ProjectLayout::log_url("p", "j"), "/files/p/compile/logs/j.txt");
    }

    #[tokio::test]
    async fn ensure_project_dirs_creates_compile_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        layout.ensure_project_dirs("p").await.unwrap();

        for sub in COMPILE_SUBDIRS {
            assert!(layout.compile_dir("p").join(sub).is_dir(), "{sub} missing");
        }
        assert!(layout.project_dir("p").join("assets").is_dir());
    }
}
