use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::I18n;
use crate::ingestion::data_uri::DataUriError;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Ollama(#[from] OllamaError),

    #[error("Document export failed")]
    Export(#[from] ExportError),

    #[error("There is no text to export")]
    NoText,

    #[error("No exported document is available for the current job")]
    NoArtifact,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Job {job_id} was replaced by a newer job")]
    Superseded { job_id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Image ingestion errors. None of these start a job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type: {mime_type}")]
    InvalidFileType { mime_type: String },

    #[error("Failed to read {file_name}: {reason}")]
    ReadFailure { file_name: String, reason: String },

    #[error("Image too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
}

/// Reasons a pipeline job ends in the `Failed` state.
///
/// The `Display` output is what the job's failure result carries, so it never
/// includes OCR backend detail; `message` fields are for logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No image was supplied")]
    NoImage,

    #[error("Text extraction failed")]
    ServiceFailure { message: String },

    #[error("Document export failed")]
    ExportFailure { message: String },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::NoImage => "no_image",
            PipelineError::ServiceFailure { .. } => "service_failure",
            PipelineError::ExportFailure { .. } => "export_failure",
        }
    }

    /// Localized message shown to the user for a failed job
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            PipelineError::NoImage => i18n.get(locale, "error-no-image", None),
            PipelineError::ServiceFailure { .. } => {
                i18n.get(locale, "error-extraction-failed", None)
            }
            PipelineError::ExportFailure { .. } => i18n.get(locale, "error-export-failed", None),
        }
    }
}

/// Ollama client errors
#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Connection failed to Ollama at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from Ollama")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },

    #[error("Image is not a valid data URI")]
    InvalidImage(#[from] DataUriError),
}

/// Document export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write document package")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// API error response (matches Axum's built-in JsonRejection format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(ValidationError::InvalidFileType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Validation(ValidationError::ReadFailure { .. }) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Validation(ValidationError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Ollama(OllamaError::ModelNotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Ollama(_) => StatusCode::BAD_GATEWAY,
            ServiceError::NoText | ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NoArtifact => StatusCode::NOT_FOUND,
            ServiceError::Superseded { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Validation(ValidationError::InvalidFileType { .. }) => {
                "invalid_file_type"
            }
            ServiceError::Validation(ValidationError::ReadFailure { .. }) => "read_failure",
            ServiceError::Validation(ValidationError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Ollama(OllamaError::Connection { .. }) => "ollama_connection",
            ServiceError::Ollama(OllamaError::ModelNotFound { .. }) => "ollama_model_not_found",
            ServiceError::Ollama(OllamaError::Generation { .. }) => "ollama_generation",
            ServiceError::Ollama(OllamaError::InvalidResponse { .. }) => "ollama_invalid_response",
            ServiceError::Ollama(OllamaError::InvalidImage(_)) => "ollama_invalid_image",
            ServiceError::Export(_) => "export_error",
            ServiceError::NoText => "no_text",
            ServiceError::NoArtifact => "no_artifact",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Superseded { .. } => "superseded",
            ServiceError::Config { .. } => "config_error",
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::Validation(ValidationError::InvalidFileType { .. }) => {
                i18n.get(locale, "error-invalid-file-type", None)
            }
            ServiceError::Validation(ValidationError::ReadFailure { .. }) => {
                i18n.get(locale, "error-read-failure", None)
            }
            ServiceError::Validation(ValidationError::FileTooLarge { max, .. }) => {
                i18n.format(locale, "error-file-too-large", &[("max", &max.to_string())])
            }
            // OCR backend detail stays in the logs
            ServiceError::Ollama(_) => i18n.get(locale, "error-extraction-failed", None),
            ServiceError::Export(_) => i18n.get(locale, "error-export-failed", None),
            ServiceError::NoText => i18n.get(locale, "error-no-text", None),
            ServiceError::NoArtifact => i18n.get(locale, "error-no-artifact", None),
            ServiceError::Superseded { .. } => i18n.get(locale, "error-superseded", None),
            ServiceError::Config { .. } => i18n.get(locale, "error-internal", None),
            ServiceError::InvalidRequest { .. } => self.to_string(),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();
        let message = self.user_message(i18n, locale);

        let response = ErrorResponse {
            message,
            code: Some(code),
            details: None,
        };

        (status, Json(response)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
            details: None,
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error with its `source()` chain, for logs.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}
