//! Document export of extracted text.

mod docx;

pub use docx::DocxExporter;

use bytes::Bytes;

use crate::error::ExportError;

/// Fixed download name for every exported document
pub const EXPORT_FILE_NAME: &str = "imagetotextpro-export.docx";

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Text that is known to contain something other than whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A generated document, ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentArtifact {
    bytes: Bytes,
    file_name: &'static str,
    content_type: &'static str,
}

impl DocumentArtifact {
    pub fn new(bytes: Bytes, file_name: &'static str, content_type: &'static str) -> Self {
        Self {
            bytes,
            file_name,
            content_type,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Renders text into a downloadable document
pub trait DocumentExporter: Send + Sync {
    fn export(&self, text: &NonEmptyText) -> Result<DocumentArtifact, ExportError>;
}
