use std::sync::Arc;

use texsync_compiler::runner::BufferSource;
use texsync_compiler::toolchain::Toolchain;
use texsync_compiler::JobRunner;
use texsync_core::RevisionRegistry;
use texsync_store::files::ProjectFiles;
use texsync_store::projects::ProjectCatalog;
use texsync_store::JobStore;

use crate::config::ServerConfig;
use crate::engine::CompileDispatcher;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Latest revision and unsaved buffers per project.
    pub registry: Arc<RevisionRegistry>,
    /// Job descriptions, status records and logs.
    pub jobs: Arc<dyn JobStore>,
    /// Project metadata index.
    pub catalog: Arc<ProjectCatalog>,
    /// Sandboxed project file access.
    pub files: ProjectFiles,
    /// Turns compile requests into queued (and possibly running) jobs.
    pub dispatcher: Arc<CompileDispatcher>,
}

impl AppState {
    /// Wire the registry, dispatcher and runner around a loaded catalog and a
    /// job store. `toolchain` is only used when compiles run in-process.
    pub fn new(
        config: ServerConfig,
        catalog: ProjectCatalog,
        jobs: Arc<dyn JobStore>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        let layout = catalog.layout().clone();
        let registry = Arc::new(RevisionRegistry::new());
        let files = ProjectFiles::new(layout.clone());

        let buffers: Arc<dyn BufferSource> = registry.clone();
        let runner = JobRunner::new(Arc::clone(&jobs), layout, toolchain).with_buffers(buffers);
        let dispatcher = CompileDispatcher::new(
            Arc::clone(&jobs),
            Arc::clone(&registry),
            files.clone(),
            Arc::new(runner),
            config.compile_mode,
        )
        .with_supersede(config.supersede_stale_jobs);

        Self {
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
            registry,
            jobs,
            catalog: Arc::new(catalog),
            files,
            dispatcher: Arc::new(dispatcher),
        }
    }
}
