//! Image ingestion.
//!
//! Turns a raw file selection into an [`ImagePayload`]: the MIME type is
//! resolved and checked, the bytes are read in full, and a self-describing
//! data URI is built once. Nothing here touches pipeline state.

pub mod data_uri;
pub mod hash;
pub mod mime_detect;

use bytes::Bytes;
use tracing::debug;

use crate::config::LimitsConfig;
use crate::error::ValidationError;

/// A file as selected by the user, before validation
#[derive(Debug, Clone)]
pub struct RawFile {
    pub file_name: String,
    /// Content type reported by the client, if any
    pub declared_mime: Option<String>,
    pub data: Bytes,
}

impl RawFile {
    pub fn from_bytes(
        file_name: impl Into<String>,
        declared_mime: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            declared_mime,
            data: data.into(),
        }
    }
}

/// A validated image, ready for OCR.
///
/// `encoded_uri` is built from `mime_type` and `data` at construction and the
/// fields are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    file_name: String,
    mime_type: String,
    data: Bytes,
    encoded_uri: String,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        let mime_type = mime_type.into();
        let encoded_uri = data_uri::encode(&mime_type, &data);
        Self {
            file_name: file_name.into(),
            mime_type,
            data,
            encoded_uri,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// `data:<mime>;base64,<payload>`
    pub fn encoded_uri(&self) -> &str {
        &self.encoded_uri
    }

    pub fn content_hash(&self) -> String {
        hash::compute_content_hash(&self.data)
    }
}

/// Validates raw files and produces image payloads
#[derive(Debug, Clone)]
pub struct ImageIngestion {
    max_image_size_bytes: u64,
}

impl ImageIngestion {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_image_size_bytes: limits.max_image_size_bytes,
        }
    }

    pub fn max_image_size_bytes(&self) -> u64 {
        self.max_image_size_bytes
    }

    /// Validate a raw file and read it into an [`ImagePayload`].
    ///
    /// A declared (or extension-derived) non-image type is rejected before any
    /// bytes are read. Files with no usable type hint are read and sniffed.
    pub async fn ingest(&self, raw: RawFile) -> Result<ImagePayload, ValidationError> {
        let hinted = raw
            .declared_mime
            .as_deref()
            .and_then(mime_detect::normalize_declared)
            .or_else(|| mime_detect::from_file_name(&raw.file_name).map(str::to_string));

        if let Some(mime) = &hinted
            && !mime_detect::is_image(mime)
        {
            debug!(file = %raw.file_name, mime = %mime, "Rejected non-image upload");
            return Err(ValidationError::InvalidFileType {
                mime_type: mime.clone(),
            });
        }

        let data = self.read_data(&raw)?;

        let mime_type = match hinted {
            Some(mime) => mime,
            None => mime_detect::sniff(&data)
                .map(str::to_string)
                .ok_or_else(|| ValidationError::InvalidFileType {
                    mime_type: "application/octet-stream".to_string(),
                })?,
        };

        let payload = ImagePayload::new(raw.file_name, mime_type, data);
        debug!(
            file = %payload.file_name(),
            mime = %payload.mime_type(),
            size = payload.data().len(),
            "Image ingested"
        );
        Ok(payload)
    }

    fn read_data(&self, raw: &RawFile) -> Result<Bytes, ValidationError> {
        self.check_size(raw.data.len() as u64)?;

        if raw.data.is_empty() {
            return Err(ValidationError::ReadFailure {
                file_name: raw.file_name.clone(),
                reason: "file is empty".to_string(),
            });
        }

        Ok(raw.data.clone())
    }

    fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_image_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_image_size_bytes,
            });
        }
        Ok(())
    }
}
