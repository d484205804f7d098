use std::path::PathBuf;
use std::time::Duration;

use texsync_compiler::ExecutionMode;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-process compiles (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Root of the per-project directories (default: `./latex_files`).
    pub files_dir: PathBuf,
    /// Where compile jobs run (default: external worker).
    pub compile_mode: ExecutionMode,
    /// Status Watcher polling interval in milliseconds (default: `500`).
    pub status_poll_interval_ms: u64,
    /// Watcher deadline in seconds; `0` disables it (default: `600`).
    pub watch_timeout_secs: u64,
    /// Ceiling for docUpdate content in bytes (default: 2 MiB).
    pub max_doc_update_bytes: usize,
    /// Seconds between WebSocket pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// File a supersede request for a project's previous job on enqueue.
    pub supersede_stale_jobs: bool,
    /// Wall-clock limit for one engine run in seconds (default: `120`).
    pub latex_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `8080`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `10`                    |
    /// | `LATEX_FILES_DIR`         | `./latex_files`         |
    /// | `COMPILE_MODE`            | `external`              |
    /// | `SIMULATE_COMPILER`       | unset                   |
    /// | `STATUS_POLL_INTERVAL_MS` | `500`                   |
    /// | `WATCH_TIMEOUT_SECS`      | `600`                   |
    /// | `MAX_DOC_UPDATE_BYTES`    | `2097152`               |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`                    |
    /// | `SUPERSEDE_STALE_JOBS`    | `false`                 |
    /// | `LATEX_TIMEOUT_SECS`      | `120`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", "8080");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let compile_mode = ExecutionMode::resolve(
            std::env::var("COMPILE_MODE").ok().as_deref(),
            std::env::var("SIMULATE_COMPILER").ok().as_deref(),
        )
        .unwrap_or_else(|e| panic!("COMPILE_MODE is invalid: {e}"));

        let supersede_stale_jobs = std::env::var("SUPERSEDE_STALE_JOBS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", "30"),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", "10"),
            files_dir: std::env::var("LATEX_FILES_DIR")
                .unwrap_or_else(|_| "./latex_files".into())
                .into(),
            compile_mode,
            status_poll_interval_ms: env_parse("STATUS_POLL_INTERVAL_MS", "500"),
            watch_timeout_secs: env_parse("WATCH_TIMEOUT_SECS", "600"),
            max_doc_update_bytes: env_parse("MAX_DOC_UPDATE_BYTES", "2097152"),
            heartbeat_interval_secs: env_parse("HEARTBEAT_INTERVAL_SECS", "30"),
            supersede_stale_jobs,
            latex_timeout_secs: env_parse("LATEX_TIMEOUT_SECS", "120"),
        }
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms.max(1))
    }

    /// `None` when watchers may poll forever.
    pub fn watch_timeout(&self) -> Option<Duration> {
        (self.watch_timeout_secs > 0).then(|| Duration::from_secs(self.watch_timeout_secs))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn latex_timeout(&self) -> Duration {
        Duration::from_secs(self.latex_timeout_secs)
    }

    /// Largest WebSocket message accepted by the transport.
    ///
    /// Six times the docUpdate ceiling plus envelope room: a control byte
    /// costs six bytes once JSON-escaped (`\u0001`), so any in-limit update
    /// fits in one frame. Oversized updates still reach the session and get a
    /// `size_limit_exceeded` ack; only frames far beyond it are cut off.
    pub fn max_ws_message_bytes(&self) -> usize {
        self.max_doc_update_bytes
            .saturating_mul(6)
            .saturating_add(64 * 1024)
    }
}

fn env_parse<T>(key: &str, default: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.into())
        .parse()
        .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>()))
}
