use texsync_core::error::CoreError;

/// Errors raised by the job store, the project catalog and file access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error (missing project, invalid path).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A status write tried to move a job out of a terminal state.
    #[error("Job {job_id} is already {state}")]
    TerminalState { job_id: String, state: &'static str },

    /// The backing store refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
