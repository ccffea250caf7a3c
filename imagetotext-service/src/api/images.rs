//! Image upload endpoints.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
};
use std::sync::Arc;

use crate::error::{I18nError, ServiceError, ValidationError};
use crate::ingestion::RawFile;
use crate::pipeline::JobSnapshot;

use super::AppState;

/// Accept a multipart `file` field and hand it to the pipeline.
///
/// Returns 202 when extraction started, 200 when the image was only staged.
pub async fn upload_image_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<JobSnapshot>), I18nError> {
    let raw_file = read_upload(&state, &headers, multipart).await?;

    let snapshot = state
        .service
        .submit_image(raw_file)
        .await
        .map_err(|e| state.i18n_error(e))?;

    let status = if state.service.auto_extract() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(snapshot)))
}

/// Upload an image and wait for its extraction to finish
pub async fn extract_image_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<JobSnapshot>, I18nError> {
    let raw_file = read_upload(&state, &headers, multipart).await?;

    let snapshot = state
        .service
        .extract_image(raw_file)
        .await
        .map_err(|e| state.i18n_error(e))?;

    Ok(Json(snapshot))
}

/// Pull the `file` field out of a multipart body
async fn read_upload(
    state: &AppState,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<RawFile, I18nError> {
    let mut raw_file: Option<RawFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, headers, e))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let declared_mime = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(state, headers, e))?;
        raw_file = Some(RawFile::from_bytes(file_name, declared_mime, data));
    }

    raw_file.ok_or_else(|| {
        state.i18n_error(ServiceError::InvalidRequest {
            message: "No file provided".to_string(),
        })
    })
}

/// A body cut off by the request size limit is an oversized image
fn multipart_error(state: &AppState, headers: &HeaderMap, error: MultipartError) -> I18nError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let max = state.service.ingestion.max_image_size_bytes();
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(max.saturating_add(1));
        return state.i18n_error(ValidationError::FileTooLarge { size, max }.into());
    }

    state.i18n_error(ServiceError::InvalidRequest {
        message: error.body_text(),
    })
}
