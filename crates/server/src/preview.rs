//! Preview file serving: `GET /preview/{user_id}/{*file}`.
//!
//! Read-only view of a workspace directory for the embedded preview frame.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::mime;
use crate::state::AppState;

pub async fn preview_handler(
    Path((user_id, file)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let workspace = state.workspace_for(&user_id);
    let Some(path) = state.pipeline.store().resolve_file(workspace, &file).await else {
        debug!(
            component = "preview",
            event = "preview.not_found",
            workspace = %workspace,
            file = %file,
            "Preview file not found"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(body) => (
            [
                (CONTENT_TYPE, mime::from_path(&path)),
                (CACHE_CONTROL, "no-store"),
            ],
            body,
        )
            .into_response(),
        // Removed between resolve and read.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(
                component = "preview",
                event = "preview.read_failed",
                workspace = %workspace,
                file = %file,
                error = %e,
                "Failed to read preview file"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
