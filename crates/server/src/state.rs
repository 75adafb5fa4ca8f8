//! Application state

use std::sync::Arc;

use crate::compiler::{CommandCompiler, Compiler, TypeStripCompiler};
use crate::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::session::SessionRegistry;
use crate::store::WorkspaceStore;

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub pipeline: Pipeline,
}

impl AppState {
    /// Build state with the compiler selected by `config`.
    pub fn new(config: ServerConfig) -> Self {
        let compiler: Arc<dyn Compiler> = match &config.compiler_command {
            Some(command) => Arc::new(CommandCompiler::new(command.clone())),
            None => Arc::new(TypeStripCompiler),
        };
        Self::with_compiler(config, compiler)
    }

    pub fn with_compiler(config: ServerConfig, compiler: Arc<dyn Compiler>) -> Self {
        let store = WorkspaceStore::new(config.workspaces_dir());
        let pipeline = Pipeline::new(store, compiler, config.compile_timeout);
        Self {
            config,
            sessions: SessionRegistry::new(),
            pipeline,
        }
    }

    /// Workspace a message should act on. In single-workspace mode every
    /// request maps to the configured id.
    pub fn workspace_for<'a>(&'a self, requested: &'a str) -> &'a str {
        self.config
            .single_workspace
            .as_deref()
            .unwrap_or(requested)
    }
}
