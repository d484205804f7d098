//! The seam between the job runner and whatever produces the PDF.
//!
//! A toolchain compiles one job inside its project directory. On success
//! `<project>/output.pdf` holds the artifact; on failure the returned
//! [`CompileError`] becomes the job's error message. Anything worth showing
//! the user goes to the job log as it happens.

mod latex;
mod simulated;

use std::path::Path;

use async_trait::async_trait;
use texsync_core::job::JobDescription;

use crate::error::CompileError;
use crate::runner::JobLog;

pub use latex::LatexToolchain;
pub use simulated::{SimulatedToolchain, PLACEHOLDER_PDF};

/// Everything a toolchain needs for one compile.
pub struct CompileInput<'a> {
    pub job: &'a JobDescription,
    pub project_dir: &'a Path,
    /// Unsaved editor content for the entry file, fresher than the disk.
    pub buffer: Option<&'a str>,
    pub log: &'a JobLog,
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn compile(&self, input: CompileInput<'_>) -> Result<(), CompileError>;
}
