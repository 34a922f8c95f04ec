//! # medexplain
//!
//! Plain-language explanations of medical reports using an LLM.
//!
//! A report (PDF, PNG/JPEG scan or Word document) is turned into text by a
//! chain of extraction strategies, the text and a question are sent to a
//! completion service under a fixed prompt, and the reply is parsed into
//! three sections: Summary, Key Findings and Recommended Actions.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input     read a local file or download from URL (≤ 200 MiB)
//!  ├─ 2. Classify  declared media type → PDF / image / Word / unsupported
//!  ├─ 3. Native    PDF text layer + tables (pdfium), DOCX paragraphs (docx-rs)
//!  ├─ 4. OCR       fallback for PDFs, only path for images (tesseract)
//!  ├─ 5. Prompt    instructions + first 6000 chars + question
//!  ├─ 6. Complete  one request, bounded by a timeout, no retry
//!  └─ 7. Parse     [Summary] / [Key Findings] / [Recommended Actions]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medexplain::{
//!     resolve_document, CompletionConfig, ExtractionPipeline, LlmCompletionClient, Session,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let client = LlmCompletionClient::from_config(&CompletionConfig::default())?;
//!     let pipeline = ExtractionPipeline::default();
//!
//!     let doc = resolve_document("blood-test.pdf", None, 60).await?;
//!     let mut session = Session::new();
//!     session.load_document_async(&pipeline, &doc).await?;
//!
//!     println!("{}", session.ask(&client, "Is my hemoglobin normal?").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medexplain` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Runtime Requirements
//!
//! - the pdfium shared library (`PDFIUM_LIB_PATH`, working directory, or system path)
//! - the `tesseract` executable for OCR

// ── Modules ──────────────────────────────────────────────────────────────

pub mod answer;
pub mod completion;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use answer::{parse, parse_reply, ParsedAnswer, FALLBACK_NOTICE};
pub use completion::{resolve_provider, CompletionClient, LlmCompletionClient, ProviderRoute};
pub use config::{
    CompletionConfig, CompletionConfigBuilder, ExtractionConfig, ExtractionConfigBuilder,
    MAX_DOCUMENT_BYTES,
};
pub use document::{ExtractedText, SourceDocument};
pub use error::{ExtractionError, MedExplainError};
pub use extract::{Extraction, ExtractionMethod, ExtractionPipeline};
pub use pipeline::classify::{classify, DocumentKind};
pub use pipeline::input::resolve_document;
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::pdf::{PageSink, PdfBackend, PdfPage};
pub use pipeline::pdfium::PdfiumBackend;
pub use progress::{ExtractionObserver, NoopObserver, ObserverHandle, Stage};
pub use prompts::{build_prompt, Prompt};
pub use session::{Reply, Role, Session, Turn};
