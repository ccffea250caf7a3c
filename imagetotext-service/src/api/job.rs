//! Current-job endpoints.

use axum::{Json, extract::State, http::StatusCode, response::Response};
use std::sync::Arc;

use crate::error::I18nError;
use crate::pipeline::JobSnapshot;

use super::AppState;
use super::export::artifact_response;

/// Snapshot of the live job
pub async fn get_job_handler(State(state): State<Arc<AppState>>) -> Json<JobSnapshot> {
    Json(state.service.snapshot())
}

/// Manual "Extract" action on the staged image
pub async fn extract_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<JobSnapshot>) {
    (StatusCode::ACCEPTED, Json(state.service.extract_staged()))
}

/// Download the document produced by a successful job
pub async fn artifact_handler(State(state): State<Arc<AppState>>) -> Result<Response, I18nError> {
    let artifact = state
        .service
        .current_artifact()
        .map_err(|e| state.i18n_error(e))?;
    Ok(artifact_response(artifact))
}
