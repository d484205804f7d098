pub mod compile;
pub mod download;
pub mod files;
pub mod project;
