/// Project identifiers are opaque UUID strings.
pub type ProjectId = String;

/// Compile job identifiers are opaque UUID strings generated at enqueue time.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
