//! Compile orchestration inside the API process.
//!
//! Contains the dispatcher that turns compile requests into queued jobs (and
//! runs them in-process when configured to), plus the status watcher that
//! translates job status records into WebSocket events.

pub mod dispatcher;
pub mod watcher;

use std::sync::Arc;

use texsync_compiler::toolchain::{LatexToolchain, SimulatedToolchain, Toolchain};
use texsync_compiler::ExecutionMode;

use crate::config::ServerConfig;

pub use dispatcher::CompileDispatcher;
pub use watcher::{StatusWatcher, WatchOutcome};

/// Toolchain used by in-process compiles for the configured mode.
///
/// External mode never runs jobs here, but still gets the real engine so a
/// mode switch needs no other wiring.
pub fn toolchain_for(config: &ServerConfig) -> Arc<dyn Toolchain> {
    match config.compile_mode {
        ExecutionMode::Simulate => Arc::new(SimulatedToolchain::default()),
        ExecutionMode::Local | ExecutionMode::External => {
            Arc::new(LatexToolchain::new(config.latex_timeout()))
        }
    }
}
