//! The extraction pipeline: format classification, native text, OCR fallback.
//!
//! ## State machine
//!
//! ```text
//! Classify ──▶ NativeAttempt ──▶ Success ─────────────────────▶ Done
//!    │              │
//!    │              └─(empty / structural error, PDF only)─▶ OcrAttempt ──▶ Done
//!    └─(raster image)────────────────────────────────────────▶ OcrAttempt
//! ```
//!
//! Word documents have no OCR path: a parse failure ends the run. Unsupported
//! media types end it immediately with [`ExtractionError::UnsupportedFormat`].
//!
//! [`ExtractionPipeline::extract`] never returns `Err` and never panics on bad
//! input; every failure is carried inside the returned [`Extraction`]. The
//! pipeline holds no mutable state, so repeated calls with the same bytes give
//! the same result.

use crate::config::ExtractionConfig;
use crate::document::ExtractedText;
use crate::error::{ExtractionError, MedExplainError};
use crate::pipeline::classify::{classify, DocumentKind};
use crate::pipeline::ocr::{self, OcrEngine, TesseractEngine};
use crate::pipeline::pdf::{self, PdfBackend};
use crate::pipeline::pdfium::PdfiumBackend;
use crate::pipeline::{docx, NativeOutcome};
use crate::progress::Stage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The strategy that produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionMethod {
    NativeText,
    Ocr,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    /// Trimmed text; empty when every strategy failed.
    pub text: ExtractedText,
    pub kind: DocumentKind,
    /// `None` when no strategy produced text.
    pub method: Option<ExtractionMethod>,
    /// Non-fatal errors from strategies that were followed by a fallback.
    pub warnings: Vec<ExtractionError>,
    /// The error that ended the run without text, if any.
    pub failure: Option<ExtractionError>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Message describing why no text is available, for display.
    pub fn failure_message(&self) -> Option<String> {
        match &self.failure {
            Some(err) => Some(err.user_message()),
            None if self.text.is_empty() => Some("No readable text was found in the document.".into()),
            None => None,
        }
    }
}

/// Document text extraction with automatic fallback.
///
/// Cheap to clone; backends are shared behind `Arc`.
#[derive(Clone)]
pub struct ExtractionPipeline {
    pdf: Arc<dyn PdfBackend>,
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
}

impl std::fmt::Debug for ExtractionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl ExtractionPipeline {
    /// Pipeline over pdfium and the tesseract executable named in `config`.
    pub fn new(config: ExtractionConfig) -> Self {
        let ocr = TesseractEngine::new(config.tesseract_cmd.clone(), config.ocr_language.clone());
        Self::with_backends(Arc::new(PdfiumBackend::new()), Arc::new(ocr), config)
    }

    /// Pipeline over caller-supplied backends.
    pub fn with_backends(
        pdf: Arc<dyn PdfBackend>,
        ocr: Arc<dyn OcrEngine>,
        config: ExtractionConfig,
    ) -> Self {
        Self { pdf, ocr, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text from `bytes` declared as `media_type`.
    pub fn extract(&self, bytes: &[u8], media_type: &str) -> Extraction {
        let mut run = Run::new(&self.config);

        run.stage(Stage::Classify);
        let kind = classify(media_type);
        info!(kind = %kind, bytes = bytes.len(), "Extracting document text");

        let result = match kind {
            DocumentKind::Pdf => self.extract_pdf(bytes, &mut run),
            DocumentKind::RasterImage => {
                run.stage(Stage::OcrAttempt);
                ocr::ocr_image(self.ocr.as_ref(), bytes, self.config.observer.as_ref())
                    .map(|text| (text, ExtractionMethod::Ocr))
            }
            DocumentKind::WordDocument => {
                run.stage(Stage::NativeAttempt);
                match docx::extract_native(bytes) {
                    NativeOutcome::Success(text) => Ok((text, ExtractionMethod::NativeText)),
                    NativeOutcome::EmptyResult => Ok((String::new(), ExtractionMethod::NativeText)),
                    NativeOutcome::StructuralError(detail) => {
                        Err(ExtractionError::NativeExtractionFailure { kind, detail })
                    }
                }
            }
            DocumentKind::Unsupported => Err(ExtractionError::UnsupportedFormat {
                media_type: media_type.to_string(),
            }),
        };

        run.finish(kind, result)
    }

    /// Extract and return only the text; empty on total failure.
    pub fn extract_text(&self, bytes: &[u8], media_type: &str) -> String {
        self.extract(bytes, media_type).text.into_string()
    }

    /// Run [`extract`](Self::extract) on the blocking thread pool.
    ///
    /// pdfium and tesseract are blocking; async callers should use this
    /// instead of calling `extract` on a runtime worker.
    pub async fn extract_blocking(
        &self,
        bytes: Vec<u8>,
        media_type: String,
    ) -> Result<Extraction, MedExplainError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.extract(&bytes, &media_type))
            .await
            .map_err(|e| MedExplainError::Internal(format!("extraction task failed: {e}")))
    }

    fn extract_pdf(
        &self,
        bytes: &[u8],
        run: &mut Run<'_>,
    ) -> Result<(String, ExtractionMethod), ExtractionError> {
        run.stage(Stage::NativeAttempt);
        let gap = self.config.detect_tables.then_some(self.config.column_gap);

        match pdf::extract_native(self.pdf.as_ref(), bytes, gap) {
            NativeOutcome::Success(text) => return Ok((text, ExtractionMethod::NativeText)),
            NativeOutcome::EmptyResult => {
                debug!("PDF has no text layer, falling back to OCR");
            }
            NativeOutcome::StructuralError(detail) => {
                run.warn(ExtractionError::NativeExtractionFailure {
                    kind: DocumentKind::Pdf,
                    detail,
                });
            }
        }

        run.stage(Stage::OcrAttempt);
        ocr::ocr_pdf(
            self.pdf.as_ref(),
            self.ocr.as_ref(),
            bytes,
            self.config.dpi,
            self.config.max_rendered_pixels,
            self.config.observer.as_ref(),
        )
        .map(|text| (text, ExtractionMethod::Ocr))
    }
}

/// Bookkeeping for a single `extract` call.
struct Run<'a> {
    config: &'a ExtractionConfig,
    warnings: Vec<ExtractionError>,
}

impl<'a> Run<'a> {
    fn new(config: &'a ExtractionConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
        }
    }

    fn stage(&self, stage: Stage) {
        debug!(%stage, "Extraction stage");
        if let Some(obs) = &self.config.observer {
            obs.on_stage(stage);
        }
    }

    fn warn(&mut self, warning: ExtractionError) {
        warn!("{warning}; trying OCR");
        if let Some(obs) = &self.config.observer {
            obs.on_warning(&warning);
        }
        self.warnings.push(warning);
    }

    fn finish(
        mut self,
        kind: DocumentKind,
        result: Result<(String, ExtractionMethod), ExtractionError>,
    ) -> Extraction {
        let extraction = match result {
            Ok((text, method)) => {
                let text = ExtractedText::new(text);
                info!(chars = text.char_count(), ?method, "Extraction finished");
                Extraction {
                    method: (!text.is_empty()).then_some(method),
                    text,
                    kind,
                    warnings: std::mem::take(&mut self.warnings),
                    failure: None,
                }
            }
            Err(err) => {
                warn!("Extraction failed: {err}");
                if let Some(obs) = &self.config.observer {
                    obs.on_failure(&err);
                }
                Extraction {
                    text: ExtractedText::default(),
                    kind,
                    method: None,
                    warnings: std::mem::take(&mut self.warnings),
                    failure: Some(err),
                }
            }
        };

        self.stage(Stage::Done);
        extraction
    }
}
