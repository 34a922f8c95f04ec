//! Document-level value types shared by the pipeline and the session.

use crate::config::MAX_DOCUMENT_BYTES;
use crate::error::MedExplainError;
use crate::pipeline::classify::{classify, DocumentKind};
use serde::{Deserialize, Serialize};

/// An uploaded document: raw bytes plus the media type it was declared as.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name (file name or last URL segment).
    pub name: String,
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes,
            media_type: media_type.into(),
        }
    }

    /// The extraction strategy the declared media type maps to.
    pub fn kind(&self) -> DocumentKind {
        classify(&self.media_type)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reject documents above [`MAX_DOCUMENT_BYTES`].
    pub fn check_size(&self) -> Result<(), MedExplainError> {
        check_size(self.size())
    }
}

/// Reject a byte count above [`MAX_DOCUMENT_BYTES`].
pub fn check_size(size: u64) -> Result<(), MedExplainError> {
    if size > MAX_DOCUMENT_BYTES {
        return Err(MedExplainError::DocumentTooLarge {
            size,
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(())
}

/// Normalised text extracted from one document.
///
/// Created once by the pipeline and never mutated; every question about the
/// document reuses the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    content: String,
}

impl ExtractedText {
    /// Wrap `content`, trimming surrounding whitespace.
    pub fn new(content: impl AsRef<str>) -> Self {
        Self {
            content: content.as_ref().trim().to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Length in characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

impl std::fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}
