//! MIME type resolution for uploaded files.

use image::ImageFormat;
use std::path::Path;

/// Generic type browsers send when they don't know better
const OCTET_STREAM: &str = "application/octet-stream";

/// Normalize a declared content type to its lower-cased essence
/// (`"Image/PNG; q=1"` becomes `"image/png"`).
///
/// Returns `None` for blank or generic declarations, which callers treat as
/// "not declared". Unparseable declarations are kept verbatim so they fail the
/// image check instead of being second-guessed.
pub fn normalize_declared(declared: &str) -> Option<String> {
    let declared = declared.trim();
    if declared.is_empty() {
        return None;
    }

    let essence = match declared.parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => declared.to_ascii_lowercase(),
    };

    (essence != OCTET_STREAM).then_some(essence)
}

/// Guess a MIME type from the file name's extension.
pub fn from_file_name(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();

    if let Some(format) = ImageFormat::from_extension(&ext) {
        return Some(format.to_mime_type());
    }

    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "json" => Some("application/json"),
        "csv" => Some("text/csv"),
        "docx" => Some(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        _ => None,
    }
}

/// Sniff an image MIME type from the leading bytes.
pub fn sniff(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Whether a MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_declared() {
        assert_eq!(normalize_declared("image/png"), Some("image/png".to_string()));
        assert_eq!(
            normalize_declared("Image/JPEG; charset=binary"),
            Some("image/jpeg".to_string())
        );
        assert_eq!(normalize_declared("application/octet-stream"), None);
        assert_eq!(normalize_declared("   "), None);
        assert_eq!(normalize_declared("garbage"), Some("garbage".to_string()));
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(from_file_name("scan.JPG"), Some("image/jpeg"));
        assert_eq!(from_file_name("page.png"), Some("image/png"));
        assert_eq!(from_file_name("page.webp"), Some("image/webp"));
        assert_eq!(from_file_name("notes.txt"), Some("text/plain"));
        assert_eq!(from_file_name("archive.xyz"), None);
        assert_eq!(from_file_name("no_extension"), None);
    }

    #[test]
    fn test_sniff() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(sniff(&png_header), Some("image/png"));
        assert_eq!(sniff(b"plain text, not an image"), None);
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("image/webp"));
        assert!(!is_image("text/plain"));
    }
}
