//! Project file DTOs.

use serde::{Deserialize, Serialize};
use texsync_core::types::Timestamp;

/// Whether a tree entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
}

/// One entry of a project tree listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Project-relative, forward-slash path.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// A file to write, as received over REST or the `save` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PutFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Body of `PUT /api/projects/{id}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct PutFiles {
    #[serde(default)]
    pub files: Vec<PutFile>,
}

/// Path and byte count of a written file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedFile {
    pub path: String,
    pub bytes: usize,
}

/// Contents of a single project file.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}
