//! Error types for the medexplain library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MedExplainError`] — **Fatal for one operation**: loading a document or
//!   answering a question cannot proceed (file missing, provider not
//!   configured, completion call failed). The session itself stays usable.
//!
//! * [`ExtractionError`] — **Non-fatal**: one extraction strategy failed.
//!   Stored inside [`crate::extract::Extraction`] as a warning (the pipeline
//!   fell back to another strategy) or as the terminal failure (no strategy
//!   produced text). The pipeline never returns it as `Err`.

use crate::pipeline::classify::DocumentKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the medexplain library.
#[derive(Debug, Error)]
pub enum MedExplainError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document is larger than the accepted upload size.
    #[error("File size exceeds {}MB limit ({size} bytes)", limit / (1024 * 1024))]
    DocumentTooLarge { size: u64, limit: u64 },

    /// Every extraction strategy failed or produced no text.
    #[error("Failed to process document: {reason}")]
    DocumentUnreadable { reason: String },

    /// A question was asked before any document was loaded.
    #[error("No document loaded. Upload a medical report first.")]
    NoDocumentLoaded,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion request failed (transport or model side). Not retried.
    #[error("Analysis failed: {message}")]
    CompletionRequestFailure { message: String },

    /// The completion request exceeded its bounded wait.
    #[error("Analysis failed: request timed out after {secs}s")]
    CompletionTimeout { secs: u64 },

    /// The reply contained none of the expected section labels.
    #[error("Reply did not contain any of the expected sections")]
    UnparseableReply,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error raised by one extraction strategy.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The declared media type matches no extraction strategy.
    #[error("Unsupported document type '{media_type}'")]
    UnsupportedFormat { media_type: String },

    /// The native parser rejected the document structure.
    #[error("{kind} parsing failed: {detail}")]
    NativeExtractionFailure { kind: DocumentKind, detail: String },

    /// Rasterisation or OCR could not run on the supplied data.
    #[error("OCR failed: {detail}")]
    OcrFailure { detail: String },
}

impl ExtractionError {
    /// Short message suitable for showing to the person who uploaded the document.
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::UnsupportedFormat { .. } => {
                "This file type is not supported. Upload a PDF, PNG, JPEG or DOCX file.".to_string()
            }
            other => format!("Text extraction failed: {other}"),
        }
    }
}
