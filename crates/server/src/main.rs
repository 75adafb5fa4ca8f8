//! Livepad server binary.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use livepad::config::{Cli, ServerConfig};
use livepad::logging::init_logging;
use livepad::router;
use livepad::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::from_cli(&cli)?;
    config.ensure_dirs()?;

    let _logging = init_logging(&config, cli.log_format, cli.log_filter.as_deref())?;

    let state = Arc::new(AppState::new(config.clone()));
    info!(
        component = "server",
        event = "server.starting",
        bind = %config.bind,
        data_dir = %config.data_dir.display(),
        compiler = state.pipeline.compiler_name(),
        compile_timeout_ms = config.compile_timeout.as_millis() as u64,
        single_workspace = ?config.single_workspace,
        "Starting Livepad server"
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        component = "server",
        event = "server.listening",
        addr = %listener.local_addr()?,
        "Listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
