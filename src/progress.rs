//! Observer trait for extraction progress and warnings.
//!
//! Inject an [`Arc<dyn ExtractionObserver>`] via
//! [`crate::config::ExtractionConfigBuilder::observer`] to receive events as
//! the pipeline moves through its states. The CLI uses this to drive its
//! spinner and to print non-fatal warnings at the point they happen; a GUI
//! would forward them to its status area.
//!
//! # Example
//!
//! ```rust
//! use medexplain::{ExtractionConfig, ExtractionError, ExtractionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct WarningCounter {
//!     warnings: AtomicUsize,
//! }
//!
//! impl ExtractionObserver for WarningCounter {
//!     fn on_warning(&self, warning: &ExtractionError) {
//!         self.warnings.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("warning: {warning}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .observer(Arc::new(WarningCounter { warnings: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// States of the extraction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Classify,
    NativeAttempt,
    OcrAttempt,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Classify => "Detecting format",
            Stage::NativeAttempt => "Reading text layer",
            Stage::OcrAttempt => "Running OCR",
            Stage::Done => "Done",
        };
        f.write_str(label)
    }
}

/// Called by the extraction pipeline as it processes a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionObserver: Send + Sync {
    /// Called on entry to each state.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before OCR runs on each page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages rasterised for OCR (1 for a raster image)
    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a strategy fails but extraction continues.
    fn on_warning(&self, warning: &ExtractionError) {
        let _ = warning;
    }

    /// Called once when extraction ends without usable text.
    fn on_failure(&self, error: &ExtractionError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ObserverHandle = Arc<dyn ExtractionObserver>;
