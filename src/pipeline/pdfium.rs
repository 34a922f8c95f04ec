//! pdfium-backed [`PdfBackend`]: text-layer reading and page rasterisation.
//!
//! ## Binding
//!
//! The pdfium shared library is located at call time, in this order:
//!
//! 1. `PDFIUM_LIB_PATH` — a library file, or a directory containing the
//!    platform-specific library name (`libpdfium.so`, `libpdfium.dylib`,
//!    `pdfium.dll`)
//! 2. the current working directory
//! 3. the system library search path
//!
//! A binding failure is reported as the error of whichever strategy needed
//! pdfium (native text or rasterisation), so a missing library degrades the
//! same way a corrupt document does instead of aborting the process.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce a
//! 6,600 × 9,300 px image. `max_pixels` caps the longest edge regardless of
//! physical size. Pages are rendered one at a time and each bitmap is handed
//! to the caller before the next is drawn, so only one page of pixels is held
//! at once even for documents close to the upload limit.

use crate::error::ExtractionError;
use crate::pipeline::classify::DocumentKind;
use crate::pipeline::pdf::{PageSink, PdfBackend, PdfPage};
use crate::pipeline::tables::TextRun;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// [`PdfBackend`] over the pdfium C++ library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    /// Explicit library location; overrides `PDFIUM_LIB_PATH`.
    pub library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let configured = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        if let Some(path) = configured {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            return Pdfium::bind_to_library(&lib)
                .map(Pdfium::new)
                .map_err(|e| format!("cannot load pdfium from '{}': {e:?}", lib.display()));
        }

        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map(Pdfium::new)
            .map_err(|e| {
                format!("pdfium library not found (set PDFIUM_LIB_PATH to its location): {e:?}")
            })
    }
}

fn native_failure(detail: String) -> ExtractionError {
    ExtractionError::NativeExtractionFailure {
        kind: DocumentKind::Pdf,
        detail,
    }
}

fn describe_load_error(e: &PdfiumError) -> String {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        "document is encrypted and requires a password".to_string()
    } else {
        format!("document is corrupt: {detail}")
    }
}

impl PdfBackend for PdfiumBackend {
    fn read_pages(&self, bytes: &[u8]) -> Result<Vec<PdfPage>, ExtractionError> {
        let pdfium = self.bind().map_err(native_failure)?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| native_failure(describe_load_error(&e)))?;

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let text_page = page
                .text()
                .map_err(|e| native_failure(format!("page {}: {e:?}", idx + 1)))?;

            let runs = text_page
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextRun {
                        text: segment.text(),
                        left: bounds.left().value,
                        right: bounds.right().value,
                        top: bounds.top().value,
                        bottom: bounds.bottom().value,
                    }
                })
                .collect();

            pages.push(PdfPage {
                text: text_page.all(),
                runs,
            });
        }

        info!("PDF text layer read: {} pages", pages.len());
        Ok(pages)
    }

    fn rasterise(
        &self,
        bytes: &[u8],
        dpi: u32,
        max_pixels: u32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), ExtractionError> {
        let ocr_failure = |detail: String| ExtractionError::OcrFailure { detail };

        let pdfium = self.bind().map_err(ocr_failure)?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ocr_failure(format!("cannot rasterise: {}", describe_load_error(&e))))?;

        let scale = dpi as f32 / 72.0;
        let max_pixels = i32::try_from(max_pixels).unwrap_or(i32::MAX).max(1);
        let pages = document.pages();
        let total = pages.len() as usize;

        for (idx, page) in pages.iter().enumerate() {
            let width = ((page.width().value * scale).round() as i32).clamp(1, max_pixels);
            let render_config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_maximum_height(max_pixels);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| ocr_failure(format!("rasterisation failed for page {}: {e:?}", idx + 1)))?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            on_page(idx + 1, total, image)?;
        }

        Ok(())
    }
}
