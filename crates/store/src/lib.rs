//! Persistence for compile jobs and project workspaces.
//!
//! - [`jobs::JobStore`]: write-once job descriptions plus polled status
//!   records, with a filesystem and an in-memory implementation.
//! - [`projects::ProjectCatalog`]: project metadata index.
//! - [`files::ProjectFiles`]: sandboxed access to project source files.
//! - [`archive`]: ZIP export of a project directory.

pub mod archive;
pub mod error;
pub mod files;
pub mod jobs;
pub mod layout;
pub mod models;
pub mod projects;

pub use error::StoreError;
pub use jobs::{FsJobStore, JobStore, MemoryJobStore};
pub use layout::ProjectLayout;
