//! ZIP export of a project directory.
//!
//! Transient compile bookkeeping (queued, working and status records, cancel
//! markers) is left out; sources, logs and `output.pdf` are included.

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::StoreError;
use crate::layout::ProjectLayout;

/// Project-relative directories that never go into an export.
const EXCLUDED_DIRS: &[&str] = &["compile/queue", "compile/working", "compile/status"];

/// File suffix of cancel markers.
const CANCEL_SUFFIX: &str = ".cancel";

/// Whether a project-relative path belongs in an export.
pub fn is_exported(rel: &str) -> bool {
    let excluded_dir = EXCLUDED_DIRS
        .iter()
        .any(|dir| rel == *dir || rel.starts_with(&format!("{dir}/")));
    !excluded_dir && !rel.ends_with(CANCEL_SUFFIX)
}

/// Download file name: the project name reduced to `[A-Za-z0-9_-]`, then the id.
pub fn archive_file_name(project_id: &str, project_name: &str) -> String {
    if project_name.is_empty() {
        return format!("{project_id}.zip");
    }
    let safe: String = project_name
        .replace(' ', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{safe}-{project_id}.zip")
}

/// Build a ZIP of the project directory in memory.
///
/// Runs on the blocking pool since the `zip` writer is synchronous.
pub async fn export_project(layout: &ProjectLayout, project_id: &str) -> Result<Vec<u8>, StoreError> {
    let root = layout.project_dir(project_id);
    tokio::task::spawn_blocking(move || write_archive(&root))
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
}

fn write_archive(root: &Path) -> Result<Vec<u8>, StoreError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut children: Vec<_> = std::fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
        children.sort_by_key(|e| e.file_name());
        for entry in children {
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !is_exported(&rel) {
                continue;
            }
            if entry.file_type()?.is_dir() {
                zip.add_directory(format!("{rel}/"), options)?;
                pending.push(path);
            } else {
                zip.start_file(rel, options)?;
                zip.write_all(&std::fs::read(&path)?)?;
            }
        }
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_compile_records_are_excluded() {
        assert!(is_exported("main.tex"));
        assert!(is_exported("compile"));
        assert!(is_exported("compile/logs/j.txt"));
        assert!(!is_exported("compile/queue"));
        assert!(!is_exported("compile/working/j.json"));
        assert!(!is_exported("compile/status/j.json"));
        assert!(!is_exported("compile/j.cancel"));
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(archive_file_name("p1", ""), "p1.zip");
        assert_eq!(archive_file_name("p1", "My Thesis (v2)"), "My_Thesis_-v2--p1.zip");
    }
}
