//! OCR backend seam.
//!
//! The pipeline only sees [`OcrService`]; [`OllamaOcr`] is the production
//! implementation backed by a local vision model.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{OllamaError, ServiceResult};
use crate::ingestion::data_uri;
use crate::ollama::{ChatMessage, OllamaClient};

const ARABIC_OCR_PROMPT: &str = "You are an expert OCR engine specializing in extracting Arabic text from images.\n\n\
Extract all the Arabic text from the following image. If the image doesn't contain Arabic text, respond with an empty string.";

/// A single OCR request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRequest {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub photo_data_uri: String,
}

impl OcrRequest {
    pub fn new(photo_data_uri: impl Into<String>) -> Self {
        Self {
            photo_data_uri: photo_data_uri.into(),
        }
    }
}

/// Structured OCR output. A missing field means no text was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    /// The extracted Arabic text from the image.
    #[serde(default)]
    pub extracted_text: String,
}

/// Something that can read Arabic text out of an image
#[async_trait]
pub trait OcrService: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, request: OcrRequest) -> ServiceResult<OcrResponse>;

    async fn is_available(&self) -> bool {
        true
    }
}

/// OCR via an Ollama vision model with JSON-schema constrained output
pub struct OllamaOcr {
    client: Arc<OllamaClient>,
    model: String,
    format: serde_json::Value,
}

impl OllamaOcr {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        let model = client.config().ocr_model.clone();
        Self {
            client,
            model,
            format: response_format(),
        }
    }
}

/// JSON schema handed to Ollama's `format` field
fn response_format() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(OcrResponse)).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "object",
            "properties": { "extractedText": { "type": "string" } }
        })
    })
}

#[async_trait]
impl OcrService for OllamaOcr {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn extract(&self, request: OcrRequest) -> ServiceResult<OcrResponse> {
        let uri = data_uri::parse(&request.photo_data_uri).map_err(OllamaError::from)?;
        debug!(mime = %uri.mime_type, "Sending image to vision model");

        let message = ChatMessage::user_with_image(ARABIC_OCR_PROMPT, uri.base64_data.to_string());
        let content = self
            .client
            .generate_structured(&self.model, vec![message], self.format.clone())
            .await?;

        let response = parse_response(&content)?;
        debug!(chars = response.extracted_text.chars().count(), "OCR response parsed");
        Ok(response)
    }

    async fn is_available(&self) -> bool {
        self.client.health_check().await
    }
}

fn parse_response(content: &str) -> Result<OcrResponse, OllamaError> {
    serde_json::from_str(content.trim()).map_err(|source| OllamaError::InvalidResponse { source })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let response = parse_response(r#"{"extractedText":"بسم الله"}"#).unwrap();
        assert_eq!(response.extracted_text, "بسم الله");
    }

    #[test]
    fn test_missing_field_means_no_text() {
        let response = parse_response("{}").unwrap();
        assert_eq!(response.extracted_text, "");
    }

    #[test]
    fn test_non_json_content_is_invalid_response() {
        let err = parse_response("Here is the text: مرحبا").unwrap_err();
        assert!(matches!(err, OllamaError::InvalidResponse { .. }));
    }

    #[test]
    fn test_response_format_describes_extracted_text() {
        let format = response_format();
        assert_eq!(format["type"], "object");
        assert_eq!(format["properties"]["extractedText"]["type"], "string");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = OcrRequest::new("data:image/png;base64,AAAA");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["photoDataUri"], "data:image/png;base64,AAAA");
    }
}
