//! Compiler adapters: source text in, artifact text out.
//!
//! Two backends:
//! - [`TypeStripCompiler`]: strips TypeScript syntax in-process with oxc.
//! - [`CommandCompiler`]: pipes the source through an external command
//!   (`sh -c <command>`), for toolchains like esbuild or swc.
//!
//! Both are stateless between calls and safe to share across connections.
//! The bounded timeout is applied by the caller; dropping a compile future
//! kills any child process it spawned.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use oxc::allocator::Allocator;
use oxc::codegen::Codegen;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum stderr kept in a failure report.
const MAX_STDERR_CHARS: usize = 4_000;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("compiler exited with {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn compiler: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("compiler produced non-UTF-8 output")]
    InvalidOutput,

    #[error("compile timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("compile task aborted: {0}")]
    Aborted(String),
}

/// A source-to-artifact transformation.
pub trait Compiler: Send + Sync {
    fn compile<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String, CompileError>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// In-process TypeScript → JavaScript type stripping.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeStripCompiler;

impl Compiler for TypeStripCompiler {
    fn compile<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String, CompileError>> {
        let source = source.to_owned();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || strip_types(&source))
                .await
                .map_err(|e| CompileError::Aborted(e.to_string()))?
        })
    }

    fn name(&self) -> &'static str {
        "type-strip"
    }
}

/// Strip TypeScript types from `source`, returning plain JavaScript.
pub fn strip_types(source: &str) -> Result<String, CompileError> {
    let allocator = Allocator::default();
    let source_type = SourceType::ts();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(CompileError::Syntax(join_diagnostics(&ret.errors)));
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let options = TransformOptions::default();
    let ret = Transformer::new(&allocator, Path::new("source.ts"), &options)
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        return Err(CompileError::Syntax(join_diagnostics(&ret.errors)));
    }

    Ok(Codegen::new().build(&program).code)
}

fn join_diagnostics<D: std::fmt::Display>(errors: &[D]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs an external command as the compiler.
///
/// The source is written to the child's stdin; its stdout is the artifact.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    command: String,
}

impl CommandCompiler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, source: &str) -> Result<String, CompileError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A compiler that exits without reading stdin closes the pipe;
            // its exit status is the meaningful result.
            if let Err(e) = stdin.write_all(source.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(CompileError::Failed {
                exit_code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| CompileError::InvalidOutput)
    }
}

impl Compiler for CommandCompiler {
    fn compile<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<String, CompileError>> {
        Box::pin(self.run(source))
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
