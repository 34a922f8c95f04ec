//! OCR fallback: recover text from raster images and rasterised PDF pages.
//!
//! OCR is best-effort. Unrecognised content yields an empty string, never an
//! error; only undecodable image data, a failed rasterisation or a missing
//! OCR engine produce [`ExtractionError::OcrFailure`].
//!
//! The default engine shells out to the `tesseract` executable. Tesseract
//! reads images from disk, so each image is written to a managed
//! [`tempfile`] as a lossless PNG that is deleted when recognition returns.

use crate::error::ExtractionError;
use crate::pipeline::pdf::PdfBackend;
use crate::progress::ObserverHandle;
use image::DynamicImage;
use std::io::Cursor;
use std::process::Command;
use tracing::{debug, info};

/// An optical character recognition engine.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text in one image.
    fn recognise(&self, image: &DynamicImage) -> Result<String, ExtractionError>;
}

/// [`OcrEngine`] backed by the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractEngine {
    fn recognise(&self, image: &DynamicImage) -> Result<String, ExtractionError> {
        let failure = |detail: String| ExtractionError::OcrFailure { detail };

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| failure(format!("cannot encode image for OCR: {e}")))?;

        let tmp = tempfile::Builder::new()
            .prefix("medexplain-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failure(format!("tempfile: {e}")))?;
        std::fs::write(tmp.path(), &png).map_err(|e| failure(format!("tempfile write: {e}")))?;

        let output = Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| {
                failure(format!(
                    "cannot run '{}': {e}. Install with: apt install tesseract-ocr",
                    self.command
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!("tesseract error: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract recognised {} chars from {}x{} image",
            text.len(),
            image.width(),
            image.height()
        );
        Ok(text)
    }
}

/// Decode raster image bytes and OCR them.
pub fn ocr_image(
    engine: &dyn OcrEngine,
    bytes: &[u8],
    observer: Option<&ObserverHandle>,
) -> Result<String, ExtractionError> {
    let image = image::load_from_memory(bytes).map_err(|e| ExtractionError::OcrFailure {
        detail: format!("invalid image data: {e}"),
    })?;

    if let Some(obs) = observer {
        obs.on_ocr_page(1, 1);
    }
    engine.recognise(&image)
}

/// Rasterise PDF pages and OCR each one as it is rendered, concatenating in
/// page order. A page's pixels are dropped once it has been recognised.
///
/// Page results are appended as the engine returns them; no separator is
/// inserted beyond what the engine emits (tesseract ends each page with a
/// form feed).
pub fn ocr_pdf(
    backend: &dyn PdfBackend,
    engine: &dyn OcrEngine,
    bytes: &[u8],
    dpi: u32,
    max_pixels: u32,
    observer: Option<&ObserverHandle>,
) -> Result<String, ExtractionError> {
    let mut text = String::new();
    let mut pages = 0;
    backend.rasterise(bytes, dpi, max_pixels, &mut |page_num: usize, total: usize, image: DynamicImage| {
        if page_num == 1 {
            info!("Running OCR on {} rasterised pages", total);
        }
        if let Some(obs) = observer {
            obs.on_ocr_page(page_num, total);
        }
        text.push_str(&engine.recognise(&image)?);
        pages = page_num;
        Ok(())
    })?;

    debug!("OCR finished after {} pages", pages);
    Ok(text)
}
