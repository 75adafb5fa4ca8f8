//! Server configuration.
//!
//! Resolved once at startup from CLI flags, with `LIVEPAD_*` environment
//! fallbacks. Data paths derive from a single data directory:
//! `--data-dir` > `LIVEPAD_DATA_DIR` > `~/.livepad`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Live TypeScript playground server.
#[derive(Debug, Parser)]
#[command(name = "livepad", version, about)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "LIVEPAD_BIND", default_value = "127.0.0.1:4000")]
    pub bind: SocketAddr,

    /// Directory holding workspaces and logs
    #[arg(long, env = "LIVEPAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Shell command used as the compiler (source on stdin, artifact on stdout).
    /// When unset, TypeScript types are stripped in-process.
    #[arg(long, env = "LIVEPAD_COMPILER_COMMAND")]
    pub compiler_command: Option<String>,

    /// Compiles running longer than this are treated as failures
    #[arg(long, env = "LIVEPAD_COMPILE_TIMEOUT_MS", default_value_t = DEFAULT_COMPILE_TIMEOUT_MS)]
    pub compile_timeout_ms: u64,

    /// Route every edit and resume to this one workspace
    #[arg(long, env = "LIVEPAD_SINGLE_WORKSPACE")]
    pub single_workspace: Option<String>,

    #[arg(long, env = "LIVEPAD_LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,

    /// tracing filter directive, e.g. `debug,hyper=warn`
    #[arg(long, env = "LIVEPAD_LOG_FILTER")]
    pub log_filter: Option<String>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub compiler_command: Option<String>,
    pub compile_timeout: Duration,
    pub single_workspace: Option<String>,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
        Ok(Self {
            bind: cli.bind,
            data_dir,
            compiler_command: cli
                .compiler_command
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            compile_timeout: Duration::from_millis(cli.compile_timeout_ms.max(1)),
            single_workspace: cli
                .single_workspace
                .as_deref()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
        })
    }

    /// Config rooted at `data_dir` with defaults for everything else.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 4000)),
            data_dir: data_dir.into(),
            compiler_command: None,
            compile_timeout: Duration::from_millis(DEFAULT_COMPILE_TIMEOUT_MS),
            single_workspace: None,
        }
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.data_dir.join("workspaces")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Create all required subdirectories under the data dir.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.workspaces_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

/// Priority: `explicit` arg (already merged with env by clap) > `~/.livepad`.
fn resolve_data_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    dirs::home_dir()
        .map(|home| home.join(".livepad"))
        .ok_or_else(|| anyhow::anyhow!("HOME directory not found; pass --data-dir"))
}
