use texsync_store::StoreError;

/// Errors raised while executing a compile job.
///
/// Every variant ends up as the `error` field of a `failed` status record.
/// [`CompileError::Store`] is also returned to the caller, and its record is
/// only written if the store still accepts it.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported engine '{0}'")]
    UnsupportedEngine(String),

    #[error("Entry file {0} not found")]
    MissingEntry(String),

    #[error("Invalid entry file: {0}")]
    InvalidEntry(String),

    #[error("Compilation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Engine exited with code {0}")]
    EngineFailed(i32),

    #[error("No PDF output generated")]
    NoOutput,
}
