//! Format classification: declared media type → extraction strategy.
//!
//! The declared type is trusted as-is (it comes from the upload widget or the
//! HTTP `Content-Type` header). No content sniffing happens here, so a
//! mislabelled file fails in the strategy it was routed to rather than being
//! silently re-routed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MEDIA_TYPE_PDF: &str = "application/pdf";
pub const MEDIA_TYPE_PNG: &str = "image/png";
pub const MEDIA_TYPE_JPEG: &str = "image/jpeg";
pub const MEDIA_TYPE_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The extraction strategy selected for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Text layer + tables, OCR fallback.
    Pdf,
    /// PNG or JPEG, OCR only.
    RasterImage,
    /// DOCX paragraphs, no fallback.
    WordDocument,
    /// No strategy exists.
    Unsupported,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::RasterImage => "Image",
            DocumentKind::WordDocument => "Word document",
            DocumentKind::Unsupported => "Unsupported document",
        };
        f.write_str(name)
    }
}

/// Map a declared media type to a [`DocumentKind`].
///
/// Comparison ignores surrounding whitespace, ASCII case and any `;`
/// parameters (`application/pdf; charset=binary` is still a PDF).
pub fn classify(media_type: &str) -> DocumentKind {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        MEDIA_TYPE_PDF => DocumentKind::Pdf,
        MEDIA_TYPE_PNG | MEDIA_TYPE_JPEG => DocumentKind::RasterImage,
        MEDIA_TYPE_DOCX => DocumentKind::WordDocument,
        _ => DocumentKind::Unsupported,
    }
}

/// Guess the declared media type from a file extension.
///
/// Mirrors the extensions accepted by the upload dialog: pdf, docx, png, jpg,
/// jpeg. Returns `None` for anything else.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MEDIA_TYPE_PDF),
        "png" => Some(MEDIA_TYPE_PNG),
        "jpg" | "jpeg" => Some(MEDIA_TYPE_JPEG),
        "docx" => Some(MEDIA_TYPE_DOCX),
        _ => None,
    }
}
