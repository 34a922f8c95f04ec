//! Native PDF extraction: text layer plus flattened tables.
//!
//! Output layout, per page in page order:
//!
//! ```text
//! <page text layer>\n
//! <table 1 row 1>\t<cell>…\n<table 1 row 2>…\n
//! <table 2 …>\n
//! ```
//!
//! Free text always precedes the page's tables. Table cells also appear in
//! the text layer; the tab-separated copy keeps row/column structure that the
//! model would otherwise have to guess from spacing.

use crate::error::ExtractionError;
use crate::pipeline::tables::{detect_tables, flatten_table, TextRun};
use crate::pipeline::NativeOutcome;
use image::DynamicImage;
use tracing::debug;

/// The text layer of a single PDF page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPage {
    /// Plain text in reading order as reported by the PDF library.
    pub text: String,
    /// Positioned text segments used for table detection.
    pub runs: Vec<TextRun>,
}

/// Receives each rendered page as `(page_num, total_pages, image)`.
///
/// An `Err` stops rendering; the backend returns it unchanged.
pub type PageSink<'a> = dyn FnMut(usize, usize, DynamicImage) -> Result<(), ExtractionError> + 'a;

/// Access to a PDF library.
///
/// Implementations must be stateless between calls; the pipeline may call
/// both methods on the same bytes.
pub trait PdfBackend: Send + Sync {
    /// Read the text layer of every page, in page order.
    ///
    /// Returns [`ExtractionError::NativeExtractionFailure`] when the document
    /// structure cannot be parsed.
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<PdfPage>, ExtractionError>;

    /// Render pages one at a time, in page order, handing each to `on_page`
    /// before the next is rendered.
    ///
    /// Returns [`ExtractionError::OcrFailure`] when rendering is impossible.
    fn rasterise(
        &self,
        bytes: &[u8],
        dpi: u32,
        max_pixels: u32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), ExtractionError>;
}

/// Run the native PDF branch and classify the result.
///
/// `column_gap` of `None` disables table detection.
pub fn extract_native(backend: &dyn PdfBackend, bytes: &[u8], column_gap: Option<f32>) -> NativeOutcome {
    let pages = match backend.read_pages(bytes) {
        Ok(pages) => pages,
        Err(ExtractionError::NativeExtractionFailure { detail, .. }) => {
            return NativeOutcome::StructuralError(detail)
        }
        Err(other) => return NativeOutcome::StructuralError(other.to_string()),
    };

    NativeOutcome::from_text(assemble_pages(&pages, column_gap))
}

/// Concatenate page text and flattened tables in page order.
pub fn assemble_pages(pages: &[PdfPage], column_gap: Option<f32>) -> String {
    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        text.push_str(&page.text);
        text.push('\n');

        if let Some(gap) = column_gap {
            let tables = detect_tables(&page.runs, gap);
            if !tables.is_empty() {
                debug!("Page {}: {} table(s) detected", idx + 1, tables.len());
            }
            for table in &tables {
                text.push_str(&flatten_table(table));
                text.push('\n');
            }
        }
    }
    text
}
