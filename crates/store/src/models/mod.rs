//! Serializable records and DTOs for projects and their files.

pub mod file;
pub mod project;
