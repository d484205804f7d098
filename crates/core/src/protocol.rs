//! Wire-level names shared by the session handler, the status watcher and
//! their tests.

/// Inbound: a client edited a file.
pub const OP_DOC_UPDATE: &str = "docUpdate";

/// Inbound: a client wants the project compiled.
pub const OP_REQUEST_COMPILE: &str = "requestCompile";

/// Inbound: persist files to the project directory.
pub const OP_SAVE: &str = "save";

/// Inbound: stop a queued or running job.
pub const OP_CANCEL_COMPILE: &str = "cancelCompile";

/// Inbound: liveness check, answered with a pong instead of an ack.
pub const OP_PING: &str = "ping";

/// Op name used in acks for frames that could not be decoded at all.
pub const OP_UNKNOWN: &str = "unknown";

/// Subprotocol echoed on the WebSocket handshake when offered.
pub const WS_SUBPROTOCOL: &str = "live-latex-v1";

// ---------------------------------------------------------------------------
// Ack error codes
// ---------------------------------------------------------------------------

/// Frame is not JSON, lacks a `type`, or has invalid fields.
pub const CODE_INVALID_MESSAGE: &str = "invalid_message";

/// Frame decoded but its `type` is not handled.
pub const CODE_UNKNOWN_TYPE: &str = "unknown_type";

/// docUpdate content exceeded the configured ceiling; the connection closes.
pub const CODE_SIZE_LIMIT_EXCEEDED: &str = "size_limit_exceeded";

/// The session's project does not exist.
pub const CODE_PROJECT_NOT_FOUND: &str = "project_not_found";

/// A client-supplied path escaped the project directory.
pub const CODE_INVALID_PATH: &str = "invalid_path";

/// Server-side failure, e.g. the job description could not be persisted.
pub const CODE_INTERNAL_ERROR: &str = "internal_error";

/// WebSocket close code sent with a size-limit rejection (RFC 6455 1009).
pub const CLOSE_CODE_MESSAGE_TOO_BIG: u16 = 1009;
