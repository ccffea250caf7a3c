//! `data:<mime>;base64,<payload>` URIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    #[error("missing `data:` scheme")]
    MissingScheme,

    #[error("missing `;base64,` marker")]
    MissingBase64Marker,

    #[error("empty MIME type")]
    EmptyMimeType,

    #[error("payload is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Borrowed view of a parsed data URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    /// Still-encoded payload, as vision APIs expect it
    pub base64_data: &'a str,
}

/// Encode bytes as a self-describing data URI
pub fn encode(mime_type: &str, data: &[u8]) -> String {
    format!(
        "{}{}{}{}",
        SCHEME,
        mime_type,
        BASE64_MARKER,
        BASE64_STANDARD.encode(data)
    )
}

/// Split a data URI into MIME type and payload, validating the payload.
pub fn parse(uri: &str) -> Result<DataUri<'_>, DataUriError> {
    let rest = uri.strip_prefix(SCHEME).ok_or(DataUriError::MissingScheme)?;
    let (mime_type, base64_data) = rest
        .split_once(BASE64_MARKER)
        .ok_or(DataUriError::MissingBase64Marker)?;

    if mime_type.trim().is_empty() {
        return Err(DataUriError::EmptyMimeType);
    }

    BASE64_STANDARD.decode(base64_data)?;

    Ok(DataUri {
        mime_type,
        base64_data,
    })
}
