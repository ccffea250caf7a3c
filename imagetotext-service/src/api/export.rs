//! Word export endpoint and download responses.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::I18nError;
use crate::export::DocumentArtifact;

use super::AppState;

#[derive(Deserialize)]
pub struct ExportRequest {
    pub text: String,
}

/// Export (possibly edited) text as a `.docx` download
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, I18nError> {
    let artifact = state
        .service
        .export_text(request.text)
        .map_err(|e| state.i18n_error(e))?;
    Ok(artifact_response(artifact))
}

/// Serve an artifact as a file attachment
pub fn artifact_response(artifact: DocumentArtifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes().clone(),
    )
        .into_response()
}
