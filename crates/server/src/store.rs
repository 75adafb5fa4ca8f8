//! Source store: one directory per workspace.
//!
//! ```text
//! <root>/<workspace>/source.ts   last raw text the user typed
//! <root>/<workspace>/index.js    last artifact that compiled
//! ```
//!
//! Writes land in a hidden temp file next to the target and are renamed into
//! place, so readers see either the old file or the new one.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

pub const SOURCE_FILE: &str = "source.ts";
pub const ARTIFACT_FILE: &str = "index.js";

const MAX_WORKSPACE_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid workspace id: {0:?}")]
    InvalidWorkspaceId(String),

    #[error("workspace io error: {0}")]
    Io(#[from] io::Error),
}

/// On-disk holding area for every workspace's source and artifact
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for a workspace id (not created).
    pub fn workspace_dir(&self, workspace: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(sanitize_workspace_id(workspace)?))
    }

    pub async fn write_source(&self, workspace: &str, text: &str) -> Result<(), StoreError> {
        self.write_atomic(workspace, SOURCE_FILE, text.as_bytes())
            .await
    }

    pub async fn read_source(&self, workspace: &str) -> Result<Option<String>, StoreError> {
        self.read_optional(workspace, SOURCE_FILE).await
    }

    pub async fn write_artifact(&self, workspace: &str, artifact: &str) -> Result<(), StoreError> {
        self.write_atomic(workspace, ARTIFACT_FILE, artifact.as_bytes())
            .await
    }

    pub async fn read_artifact(&self, workspace: &str) -> Result<Option<String>, StoreError> {
        self.read_optional(workspace, ARTIFACT_FILE).await
    }

    /// Path of an existing regular file inside the workspace, or `None` if the
    /// workspace id is invalid, the path leaves the workspace or names a hidden
    /// entry (staging files are hidden), or nothing is there.
    pub async fn resolve_file(&self, workspace: &str, relative: &str) -> Option<PathBuf> {
        let dir = self.workspace_dir(workspace).ok()?;
        let relative = Path::new(relative);
        let visible = relative.components().all(|c| match c {
            Component::Normal(name) => !name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        if relative.as_os_str().is_empty() || !visible {
            return None;
        }
        let path = dir.join(relative);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    async fn read_optional(
        &self,
        workspace: &str,
        file: &str,
    ) -> Result<Option<String>, StoreError> {
        let path = self.workspace_dir(workspace)?.join(file);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(
        &self,
        workspace: &str,
        file: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let dir = self.workspace_dir(workspace)?;
        fs::create_dir_all(&dir).await?;

        let target = dir.join(file);
        let tmp = dir.join(format!(".{file}.{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Map a workspace id onto a single safe path segment.
///
/// Anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_workspace_id(workspace: &str) -> Result<String, StoreError> {
    let trimmed = workspace.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_WORKSPACE_ID_LEN {
        return Err(StoreError::InvalidWorkspaceId(workspace.to_string()));
    }
    Ok(trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect())
}
