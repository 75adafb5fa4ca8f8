//! Edit → compile → publish.
//!
//! Every edit gets a per-workspace generation number on arrival. Raw source
//! and the artifact are each written under that workspace's lock, and only if
//! the edit is newer than whatever was last written to that file. A slow
//! compile of an older edit therefore never replaces the artifact of a newer
//! edit that finished first. Workspaces never contend with each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::compiler::{CompileError, Compiler};
use crate::store::{sanitize_workspace_id, StoreError, WorkspaceStore};

/// What happened to one edit
#[derive(Debug)]
pub enum EditOutcome {
    /// Artifact written; the client should reload.
    Published { generation: u64 },
    /// Source saved, artifact untouched.
    CompileFailed(CompileError),
    /// Compiled, but a newer edit already published.
    Superseded { generation: u64 },
}

impl EditOutcome {
    pub fn should_reload(&self) -> bool {
        matches!(self, EditOutcome::Published { .. })
    }
}

/// Highest generation written to each file of a workspace.
#[derive(Debug, Default)]
struct Written {
    source: u64,
    artifact: u64,
}

#[derive(Debug, Default)]
struct WorkspaceGate {
    next_generation: AtomicU64,
    written: Mutex<Written>,
}

pub struct Pipeline {
    store: WorkspaceStore,
    compiler: Arc<dyn Compiler>,
    compile_timeout: Duration,
    gates: DashMap<String, Arc<WorkspaceGate>>,
}

impl Pipeline {
    pub fn new(
        store: WorkspaceStore,
        compiler: Arc<dyn Compiler>,
        compile_timeout: Duration,
    ) -> Self {
        Self {
            store,
            compiler,
            compile_timeout,
            gates: DashMap::new(),
        }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn compiler_name(&self) -> &'static str {
        self.compiler.name()
    }

    /// Persist the edit's source, compile it, and publish the artifact if the
    /// edit is still the newest one for this workspace.
    pub async fn apply_edit(
        &self,
        workspace: &str,
        source_lines: &[String],
    ) -> Result<EditOutcome, StoreError> {
        let gate = self.gate(workspace)?;
        let generation = gate.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let source = source_lines.join("\n");

        {
            let mut written = gate.written.lock().await;
            if generation > written.source {
                self.store.write_source(workspace, &source).await?;
                written.source = generation;
            }
        }

        let started = Instant::now();
        let compiled =
            match tokio::time::timeout(self.compile_timeout, self.compiler.compile(&source)).await
            {
                Ok(result) => result,
                Err(_) => Err(CompileError::TimedOut(self.compile_timeout)),
            };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let artifact = match compiled {
            Ok(artifact) => artifact,
            Err(error) => {
                warn!(
                    component = "pipeline",
                    event = "pipeline.compile_failed",
                    workspace = %workspace,
                    generation,
                    compiler = self.compiler.name(),
                    elapsed_ms,
                    error = %error,
                    "Compile failed, keeping previous artifact"
                );
                return Ok(EditOutcome::CompileFailed(error));
            }
        };

        let mut written = gate.written.lock().await;
        if generation <= written.artifact {
            debug!(
                component = "pipeline",
                event = "pipeline.superseded",
                workspace = %workspace,
                generation,
                published = written.artifact,
                "Discarding stale compile result"
            );
            return Ok(EditOutcome::Superseded { generation });
        }
        self.store.write_artifact(workspace, &artifact).await?;
        written.artifact = generation;

        info!(
            component = "pipeline",
            event = "pipeline.published",
            workspace = %workspace,
            generation,
            elapsed_ms,
            artifact_bytes = artifact.len(),
            "Published artifact"
        );
        Ok(EditOutcome::Published { generation })
    }

    /// Last-known source as lines; empty if nothing was ever saved.
    pub async fn resume(&self, workspace: &str) -> Result<Vec<String>, StoreError> {
        let source = self.store.read_source(workspace).await?;
        Ok(match source {
            Some(text) => text.split('\n').map(str::to_string).collect(),
            None => Vec::new(),
        })
    }

    /// Currently published artifact, if any compile has succeeded.
    pub async fn artifact(&self, workspace: &str) -> Result<Option<String>, StoreError> {
        self.store.read_artifact(workspace).await
    }

    fn gate(&self, workspace: &str) -> Result<Arc<WorkspaceGate>, StoreError> {
        // Key by the on-disk name so ids sharing a directory share a gate.
        let key = sanitize_workspace_id(workspace)?;
        Ok(Arc::clone(self.gates.entry(key).or_default().value()))
    }
}
