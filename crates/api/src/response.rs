//! Response payloads shared by several handlers.

use serde::Serialize;
use texsync_core::Revision;
use texsync_store::models::file::SavedFile;

/// `202 Accepted` body of a compile request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileAccepted {
    pub job_id: String,
    pub revision: Revision,
}

#[derive(Debug, Serialize)]
pub struct SavedFiles {
    pub saved: Vec<SavedFile>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub canceled: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub api: &'static str,
}
