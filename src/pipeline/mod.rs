//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one step. Stages that need a native
//! library or an external program sit behind a trait ([`pdf::PdfBackend`],
//! [`ocr::OcrEngine`]) so the state machine in [`crate::extract`] can be
//! driven by fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ classify ──▶ pdf / docx ──(fallback)──▶ ocr
//! (path/URL) (media type) (native text)            (pdfium raster + tesseract)
//!
//! reply ──▶ postprocess ──▶ crate::answer
//! ```
//!
//! 1. [`input`]    — read a local file or download a URL into a `SourceDocument`
//! 2. [`classify`] — declared media type → extraction strategy
//! 3. [`pdf`]      — PDF text layer plus flattened [`tables`]
//! 4. [`docx`]     — Word paragraph stream
//! 5. [`ocr`]      — OCR of raster images and rasterised PDF pages
//! 6. [`pdfium`]   — the pdfium-backed [`pdf::PdfBackend`]
//! 7. [`postprocess`] — deterministic clean-up of the model reply

pub mod classify;
pub mod docx;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod pdfium;
pub mod postprocess;
pub mod tables;

/// Result of one native (non-OCR) extraction attempt.
///
/// The extraction state machine branches on this tag: only `Success` ends
/// the chain; the other two decide whether a fallback runs.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeOutcome {
    /// Non-blank text was produced.
    Success(String),
    /// The document parsed but contained no usable text.
    EmptyResult,
    /// The parser rejected the document structure.
    StructuralError(String),
}

impl NativeOutcome {
    /// Classify raw extracted text as `Success` or `EmptyResult`.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            NativeOutcome::EmptyResult
        } else {
            NativeOutcome::Success(text)
        }
    }
}
