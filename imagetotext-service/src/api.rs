//! HTTP API for the ImageToText service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Image upload, synchronous extraction and the current job
//! - Word export of (edited) text
//! - WebSocket connections

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{I18nError, ServiceError};
use crate::service::ImageToTextService;
use crate::websocket::handle_ws_connection;

pub mod export;
pub mod images;
pub mod job;
use export::export_handler;
use images::{extract_image_handler, upload_image_handler};
use job::{artifact_handler, extract_handler, get_job_handler};

/// Multipart framing allowance on top of the image size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<ImageToTextService>,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), self.service.locale())
    }
}

/// Build the API router
pub fn router(service: Arc<ImageToTextService>, metrics: Option<PrometheusHandle>) -> Router {
    let max_body_size =
        service.runtime_config.dynamic().limits.max_image_size_bytes as usize + MULTIPART_OVERHEAD_BYTES;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/models", get(models_handler))
        .route(
            "/images",
            post(upload_image_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route(
            "/extract",
            post(extract_image_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/job", get(get_job_handler))
        .route("/job/extract", post(extract_handler))
        .route("/job/artifact", get(artifact_handler))
        .route("/export", post(export_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ocr_available = state.service.ocr_available().await;
    let locale = state.service.locale();

    let status = if ocr_available {
        state.service.i18n.get(locale, "health-status-healthy", None)
    } else {
        state.service.i18n.format(
            locale,
            "health-status-degraded",
            &[("reason", "OCR backend unavailable")],
        )
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        ocr_backend: state.service.ocr.name().to_string(),
        ocr_available,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    ocr_backend: String,
    ocr_available: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

// === WebSocket ===

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state.service.clone()))
}

// === Models ===

async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<crate::ollama::ModelInfo>>, I18nError> {
    let models = state
        .service
        .list_models()
        .await
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(models))
}


#[cfg(test)]
mod tests {
    use super::testing::{body_json, send};
    use super::*;
    use crate::ocr::testing::ScriptedOcr;
    use crate::service::testing::service;
    use axum::body::Body;
    use axum::http::Request;

    fn app() -> Router {
        let service = Arc::new(service(true, Arc::new(ScriptedOcr::default())));
        router(service, None)
    }

    #[tokio::test]
    async fn test_health_reports_ocr_backend() {
        let response = send(
            &app(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "Service is healthy");
        assert_eq!(body["ocr_backend"], "scripted");
        assert_eq!(body["ocr_available"], true);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_empty() {
        let response = send(
            &app(),
            Request::get("/metrics").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn test_current_job_starts_idle() {
        let response = send(&app(), Request::get("/api/job").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["state"], "idle");
        assert!(body["result"].is_null());
    }
}
