//! Integration tests for extraction, prompting, parsing and the session.
//!
//! The PDF library, OCR engine and completion service are replaced by fakes
//! that count their calls, so these tests need neither pdfium, tesseract nor
//! an API key.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use medexplain::pipeline::classify::{MEDIA_TYPE_DOCX, MEDIA_TYPE_JPEG, MEDIA_TYPE_PDF, MEDIA_TYPE_PNG};
use medexplain::pipeline::pdf::PageSink;
use medexplain::pipeline::tables::TextRun;
use medexplain::session::ERROR_REPLY;
use medexplain::{
    build_prompt, parse, CompletionClient, CompletionConfig, DocumentKind, ExtractionConfig, ExtractionError,
    ExtractionMethod, ExtractionObserver, ExtractionPipeline, MedExplainError, OcrEngine,
    PdfBackend, PdfPage, Role, Session, SourceDocument, Stage, FALLBACK_NOTICE,
    MAX_DOCUMENT_BYTES,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// PDF backend returning fixed pages (or a parse error) and fixed rasters.
#[derive(Default)]
struct FakePdf {
    pages: Option<Vec<PdfPage>>,
    raster_pages: usize,
    read_calls: AtomicUsize,
    raster_calls: AtomicUsize,
}

impl FakePdf {
    fn with_text(pages: &[&str]) -> Self {
        Self {
            pages: Some(
                pages
                    .iter()
                    .map(|t| PdfPage {
                        text: t.to_string(),
                        runs: vec![],
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn corrupt(raster_pages: usize) -> Self {
        Self {
            pages: None,
            raster_pages,
            ..Default::default()
        }
    }
}

impl PdfBackend for FakePdf {
    fn read_pages(&self, _: &[u8]) -> Result<Vec<PdfPage>, ExtractionError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .clone()
            .ok_or_else(|| ExtractionError::NativeExtractionFailure {
                kind: DocumentKind::Pdf,
                detail: "xref table is damaged".into(),
            })
    }

    fn rasterise(
        &self,
        _: &[u8],
        _: u32,
        _: u32,
        on_page: &mut PageSink<'_>,
    ) -> Result<(), ExtractionError> {
        self.raster_calls.fetch_add(1, Ordering::SeqCst);
        for n in 1..=self.raster_pages {
            on_page(n, self.raster_pages, DynamicImage::ImageRgb8(RgbImage::new(8, 8)))?;
        }
        Ok(())
    }
}

/// OCR engine returning the same text for every image.
struct CountingOcr {
    text: String,
    calls: AtomicUsize,
}

impl CountingOcr {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for CountingOcr {
    fn recognise(&self, _: &DynamicImage) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Completion client replaying scripted replies and recording prompts.
#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<Vec<Result<String, MedExplainError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<String, MedExplainError>>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str) -> Result<String, MedExplainError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(MedExplainError::CompletionRequestFailure {
                message: "no scripted reply".into(),
            }))
    }
}

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<Stage>>,
    warnings: Mutex<Vec<ExtractionError>>,
}

impl ExtractionObserver for Recorder {
    fn on_stage(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_warning(&self, warning: &ExtractionError) {
        self.warnings.lock().unwrap().push(warning.clone());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pipeline(pdf: &Arc<FakePdf>, ocr: &Arc<CountingOcr>) -> ExtractionPipeline {
    ExtractionPipeline::with_backends(pdf.clone(), ocr.clone(), ExtractionConfig::default())
}

fn encoded_image(format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([255, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};
    let mut docx = Docx::new();
    for p in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)));
    }
    let mut buf = Cursor::new(Vec::new());
    docx.build().pack(&mut buf).unwrap();
    buf.into_inner()
}

const WELL_FORMED_REPLY: &str = "[Summary]\nMild anemia.\n[Key Findings]\n- Hemoglobin 10.1 g/dL ⚠️ (12-16)\n[Recommended Actions]\n- Discuss iron studies with your doctor";

// ── Extraction ───────────────────────────────────────────────────────────────

#[test]
fn test_pdf_text_layer_is_used_without_ocr() {
    let pdf = Arc::new(FakePdf::with_text(&["Page one", "Page two"]));
    let ocr = Arc::new(CountingOcr::new("should not appear"));

    let out = pipeline(&pdf, &ocr).extract(b"%PDF-1.7", MEDIA_TYPE_PDF);

    assert_eq!(out.text.as_str(), "Page one\nPage two");
    assert_eq!(out.method, Some(ExtractionMethod::NativeText));
    assert!(out.warnings.is_empty());
    assert_eq!(ocr.calls(), 0);
    assert_eq!(pdf.raster_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pdf_tables_follow_page_text() {
    let line = |y: f32, cells: &[(&str, f32, f32)]| -> Vec<TextRun> {
        cells
            .iter()
            .map(|(t, l, r)| TextRun::new(*t, *l, y, *r, y + 10.0))
            .collect()
    };
    let mut runs = line(680.0, &[("Test", 50.0, 80.0), ("Value", 200.0, 240.0)]);
    runs.extend(line(665.0, &[("Hemoglobin", 50.0, 120.0), ("10.1", 205.0, 230.0)]));

    let pdf = Arc::new(FakePdf {
        pages: Some(vec![
            PdfPage {
                text: "Test Value\nHemoglobin 10.1".into(),
                runs,
            },
            PdfPage {
                text: "Signed, Dr. Lee".into(),
                runs: vec![],
            },
        ]),
        ..Default::default()
    });
    let ocr = Arc::new(CountingOcr::new(""));

    let text = pipeline(&pdf, &ocr).extract_text(b"%PDF", MEDIA_TYPE_PDF);
    assert_eq!(
        text,
        "Test Value\nHemoglobin 10.1\nTest\tValue\nHemoglobin\t10.1\nSigned, Dr. Lee"
    );
}

#[test]
fn test_table_detection_can_be_disabled() {
    let pdf = Arc::new(FakePdf {
        pages: Some(vec![PdfPage {
            text: "A B\nC D".into(),
            runs: vec![
                TextRun::new("A", 50.0, 700.0, 60.0, 710.0),
                TextRun::new("B", 200.0, 700.0, 210.0, 710.0),
                TextRun::new("C", 50.0, 685.0, 60.0, 695.0),
                TextRun::new("D", 200.0, 685.0, 210.0, 695.0),
            ],
        }]),
        ..Default::default()
    });
    let ocr = Arc::new(CountingOcr::new(""));
    let config = ExtractionConfig::builder().detect_tables(false).build().unwrap();

    let text = ExtractionPipeline::with_backends(pdf, ocr, config).extract_text(b"%PDF", MEDIA_TYPE_PDF);
    assert_eq!(text, "A B\nC D");
}

#[test]
fn test_corrupt_pdf_falls_back_to_ocr_with_warning() {
    let pdf = Arc::new(FakePdf::corrupt(2));
    let ocr = Arc::new(CountingOcr::new("Scanned line\n"));
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .observer(recorder.clone())
        .build()
        .unwrap();

    let out = ExtractionPipeline::with_backends(pdf.clone(), ocr.clone(), config)
        .extract(b"%PDF-garbage", MEDIA_TYPE_PDF);

    assert_eq!(out.text.as_str(), "Scanned line\nScanned line");
    assert_eq!(out.method, Some(ExtractionMethod::Ocr));
    assert_eq!(ocr.calls(), 2);
    assert_eq!(out.warnings.len(), 1);
    assert!(matches!(
        out.warnings[0],
        ExtractionError::NativeExtractionFailure { kind: DocumentKind::Pdf, .. }
    ));
    assert!(out.failure.is_none());

    assert_eq!(recorder.warnings.lock().unwrap().len(), 1);
    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![Stage::Classify, Stage::NativeAttempt, Stage::OcrAttempt, Stage::Done]
    );
}

#[test]
fn test_empty_text_layer_falls_back_without_warning() {
    let pdf = Arc::new(FakePdf {
        pages: Some(vec![PdfPage::default(), PdfPage::default()]),
        raster_pages: 2,
        ..Default::default()
    });
    let ocr = Arc::new(CountingOcr::new("Page from scan\n\x0c"));

    let out = pipeline(&pdf, &ocr).extract(b"%PDF", MEDIA_TYPE_PDF);
    assert_eq!(out.method, Some(ExtractionMethod::Ocr));
    assert!(out.warnings.is_empty());
    assert_eq!(out.text.as_str(), "Page from scan\n\x0cPage from scan");
}

#[test]
fn test_images_go_straight_to_ocr() {
    for (media_type, format) in [(MEDIA_TYPE_PNG, ImageFormat::Png), (MEDIA_TYPE_JPEG, ImageFormat::Jpeg)] {
        let pdf = Arc::new(FakePdf::with_text(&["never read"]));
        let ocr = Arc::new(CountingOcr::new("  Glucose 5.4 mmol/L \n"));

        let out = pipeline(&pdf, &ocr).extract(&encoded_image(format), media_type);

        assert_eq!(out.text.as_str(), "Glucose 5.4 mmol/L", "{media_type}");
        assert_eq!(out.kind, DocumentKind::RasterImage);
        assert_eq!(out.method, Some(ExtractionMethod::Ocr));
        assert_eq!(pdf.read_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ocr.calls(), 1);
    }
}

#[test]
fn test_invalid_image_bytes_fail_with_empty_text() {
    let pdf = Arc::new(FakePdf::default());
    let ocr = Arc::new(CountingOcr::new("unused"));

    let out = pipeline(&pdf, &ocr).extract(b"\x89PNG but not really", MEDIA_TYPE_PNG);
    assert!(out.is_empty());
    assert!(matches!(out.failure, Some(ExtractionError::OcrFailure { .. })));
    assert_eq!(ocr.calls(), 0);
}

#[test]
fn test_docx_paragraphs_extracted() {
    let pdf = Arc::new(FakePdf::default());
    let ocr = Arc::new(CountingOcr::new("unused"));

    let out = pipeline(&pdf, &ocr).extract(
        &docx_bytes(&["Discharge summary", "Metformin 500 mg twice daily"]),
        MEDIA_TYPE_DOCX,
    );
    assert_eq!(out.text.as_str(), "Discharge summary\nMetformin 500 mg twice daily");
    assert_eq!(out.method, Some(ExtractionMethod::NativeText));
    assert_eq!(ocr.calls(), 0);
}

#[test]
fn test_corrupt_docx_never_runs_ocr() {
    let pdf = Arc::new(FakePdf::default());
    let ocr = Arc::new(CountingOcr::new("must not be used"));

    let out = pipeline(&pdf, &ocr).extract(b"PK\x03\x04 truncated", MEDIA_TYPE_DOCX);

    assert_eq!(out.text.as_str(), "");
    assert!(matches!(
        out.failure,
        Some(ExtractionError::NativeExtractionFailure {
            kind: DocumentKind::WordDocument,
            ..
        })
    ));
    assert_eq!(ocr.calls(), 0);
    assert_eq!(pdf.raster_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsupported_media_type() {
    let pdf = Arc::new(FakePdf::default());
    let ocr = Arc::new(CountingOcr::new("unused"));

    let out = pipeline(&pdf, &ocr).extract(b"plain text", "text/plain");
    assert_eq!(out.text.as_str(), "");
    assert!(matches!(out.failure, Some(ExtractionError::UnsupportedFormat { .. })));
    assert_eq!(ocr.calls(), 0);
    assert_eq!(pdf.read_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_output_is_always_trimmed() {
    let pdf = Arc::new(FakePdf::with_text(&["\n\n  Result: negative  \n\n"]));
    let ocr = Arc::new(CountingOcr::new("\n\n OCR text \n\n"));
    let p = pipeline(&pdf, &ocr);

    let cases: Vec<(Vec<u8>, &str)> = vec![
        (b"%PDF".to_vec(), MEDIA_TYPE_PDF),
        (encoded_image(ImageFormat::Png), MEDIA_TYPE_PNG),
        (docx_bytes(&["", "  Note  ", ""]), MEDIA_TYPE_DOCX),
    ];
    for (bytes, media_type) in cases {
        let text = p.extract_text(&bytes, media_type);
        assert_eq!(text, text.trim(), "{media_type}");
        assert!(!text.is_empty(), "{media_type}");
    }
}

#[test]
fn test_extract_is_idempotent() {
    let pdf = Arc::new(FakePdf::corrupt(3));
    let ocr = Arc::new(CountingOcr::new("page\n"));
    let p = pipeline(&pdf, &ocr);

    let first = p.extract(b"%PDF", MEDIA_TYPE_PDF);
    let second = p.extract(b"%PDF", MEDIA_TYPE_PDF);
    assert_eq!(first, second);
}

// ── Prompt & parser ──────────────────────────────────────────────────────────

#[test]
fn test_prompt_excerpt_capped_for_huge_document() {
    let text: String = "a".repeat(1_000_000);
    let prompt = build_prompt(&text, "Summarise");

    let doc_part = prompt
        .split("Document:\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\nQuestion:").next())
        .unwrap();
    assert_eq!(doc_part.chars().count(), 6000);
}

#[test]
fn test_parse_three_sections() {
    let out = parse("[Summary]\nA\n[Key Findings]\nB\n[Recommended Actions]\nC");
    let s = out.find("**Summary**\nA").unwrap();
    let f = out.find("**Key Findings**\nB").unwrap();
    let a = out.find("**Recommended Actions**\nC").unwrap();
    assert!(s < f && f < a);
}

#[test]
fn test_parse_without_labels() {
    assert_eq!(parse("random text with no labels"), FALLBACK_NOTICE);
}

#[test]
fn test_parse_summary_only() {
    let out = parse("[Summary]\nOnly this");
    assert!(out.contains("**Summary**\nOnly this"));
    assert!(!out.contains("Key Findings"));
    assert!(!out.contains("Recommended Actions"));
}

// ── Session ──────────────────────────────────────────────────────────────────

fn loaded_session(text: &str) -> Session {
    let pdf = Arc::new(FakePdf::with_text(&[text]));
    let ocr = Arc::new(CountingOcr::new(""));
    let mut session = Session::new();
    session
        .load_document(&pipeline(&pdf, &ocr), &SourceDocument::new("cbc.pdf", b"%PDF".to_vec(), MEDIA_TYPE_PDF))
        .unwrap();
    session
}

#[tokio::test]
async fn test_ask_without_document() {
    let mut session = Session::new();
    let client = ScriptedClient::new(vec![Ok(WELL_FORMED_REPLY.into())]);

    let err = session.ask(&client, "Is this normal?").await.unwrap_err();
    assert!(matches!(err, MedExplainError::NoDocumentLoaded));
    assert!(client.prompts.lock().unwrap().is_empty());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn test_ask_renders_sections_and_records_history() {
    let mut session = loaded_session("Hemoglobin 10.1 g/dL");
    let client = ScriptedClient::new(vec![Ok(format!("<think>hmm</think>\n{WELL_FORMED_REPLY}"))]);

    let answer = session.ask(&client, "Am I anemic?").await.unwrap();
    assert!(answer.starts_with("**Summary**\nMild anemia."));
    assert!(answer.contains("**Recommended Actions**\n- Discuss iron studies"));

    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Document:\nHemoglobin 10.1 g/dL"));
    assert!(prompts[0].contains("Question: Am I anemic?"));

    let roles: Vec<Role> = session.messages().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_failed_completion_keeps_session_usable() {
    let mut session = loaded_session("LDL 4.9 mmol/L");
    let client = ScriptedClient::new(vec![
        Err(MedExplainError::CompletionTimeout { secs: 45 }),
        Ok(WELL_FORMED_REPLY.into()),
    ]);

    let first = session.ask(&client, "Is my cholesterol high?").await.unwrap();
    assert_eq!(first, ERROR_REPLY);

    let second = session.ask_detailed(&client, "Is my cholesterol high?").await.unwrap();
    assert!(second.error.is_none());
    assert_eq!(
        second.answer.and_then(|a| a.summary).as_deref(),
        Some("Mild anemia.")
    );
    assert_eq!(client.prompts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_prompt_excerpt_capped_in_session() {
    let long = "§".repeat(50_000);
    let mut session = loaded_session(&long);
    let client = ScriptedClient::new(vec![Ok("[Summary]\nok".into())]);

    session.ask(&client, "Anything odd?").await.unwrap();
    let prompt = client.prompts.lock().unwrap()[0].clone();
    assert_eq!(prompt.matches('§').count(), 6000);
}

#[tokio::test]
async fn test_configured_excerpt_length_reaches_prompt() {
    let config = CompletionConfig::builder().excerpt_chars(100).build().unwrap();
    let long = "§".repeat(5_000);
    let pdf = Arc::new(FakePdf::with_text(&[long.as_str()]));
    let ocr = Arc::new(CountingOcr::new(""));
    let mut session = Session::with_config(&config);
    session
        .load_document(&pipeline(&pdf, &ocr), &SourceDocument::new("long.pdf", b"%PDF".to_vec(), MEDIA_TYPE_PDF))
        .unwrap();
    let client = ScriptedClient::new(vec![Ok("[Summary]\nok".into())]);

    session.ask(&client, "Anything odd?").await.unwrap();
    let prompt = client.prompts.lock().unwrap()[0].clone();
    assert_eq!(prompt.matches('§').count(), 100);
}

#[tokio::test]
async fn test_unparseable_reply_is_recorded() {
    let mut session = loaded_session("Sodium 139 mmol/L");
    let client = ScriptedClient::new(vec![Ok("I cannot help with that.".into())]);

    let reply = session.ask_detailed(&client, "Is sodium fine?").await.unwrap();
    assert_eq!(reply.rendered, FALLBACK_NOTICE);
    assert!(reply.answer.is_none());
    assert_eq!(
        reply.error.as_deref(),
        Some(MedExplainError::UnparseableReply.to_string().as_str())
    );
    assert_eq!(session.messages().last().map(|t| t.content.as_str()), Some(FALLBACK_NOTICE));
}

#[tokio::test]
async fn test_new_document_restarts_history() {
    let mut session = loaded_session("Ferritin 8 ng/mL");
    let client = ScriptedClient::new(vec![Ok(WELL_FORMED_REPLY.into())]);
    session.ask(&client, "Am I iron deficient?").await.unwrap();
    assert_eq!(session.messages().len(), 3);

    let pdf = Arc::new(FakePdf::with_text(&["Vitamin D 75 nmol/L"]));
    let ocr = Arc::new(CountingOcr::new(""));
    session
        .load_document(&pipeline(&pdf, &ocr), &SourceDocument::new("vitd.pdf", b"%PDF".to_vec(), MEDIA_TYPE_PDF))
        .unwrap();

    assert_eq!(session.document_name(), Some("vitd.pdf"));
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].role, Role::Assistant);
}

#[test]
fn test_unreadable_document_keeps_previous_one() {
    let mut session = loaded_session("Potassium 4.1");

    let pdf = Arc::new(FakePdf::default());
    let ocr = Arc::new(CountingOcr::new(""));
    let err = session
        .load_document(
            &pipeline(&pdf, &ocr),
            &SourceDocument::new("notes.txt", b"hello".to_vec(), "text/plain"),
        )
        .unwrap_err();

    assert!(matches!(err, MedExplainError::DocumentUnreadable { .. }));
    assert!(err.to_string().starts_with("Failed to process document"));
    assert_eq!(session.document().map(|t| t.as_str()), Some("Potassium 4.1"));
}

#[test]
fn test_oversized_document_rejected_before_extraction() {
    let pdf = Arc::new(FakePdf::with_text(&["never read"]));
    let ocr = Arc::new(CountingOcr::new(""));
    let doc = SourceDocument::new(
        "huge.pdf",
        vec![0u8; (MAX_DOCUMENT_BYTES + 1) as usize],
        MEDIA_TYPE_PDF,
    );

    let err = Session::new().load_document(&pipeline(&pdf, &ocr), &doc).unwrap_err();
    assert!(matches!(err, MedExplainError::DocumentTooLarge { .. }));
    assert!(err.to_string().contains("200MB"));
    assert_eq!(pdf.read_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_clear_document_resets_history() {
    let mut session = loaded_session("TSH 2.1");
    session.clear_document();
    assert!(session.document().is_none());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn test_load_document_async_matches_sync() {
    let pdf = Arc::new(FakePdf::with_text(&["Creatinine 88 umol/L"]));
    let ocr = Arc::new(CountingOcr::new(""));
    let doc = SourceDocument::new("renal.pdf", b"%PDF".to_vec(), MEDIA_TYPE_PDF);

    let mut session = Session::new();
    let extraction = session
        .load_document_async(&pipeline(&pdf, &ocr), &doc)
        .await
        .unwrap();
    assert_eq!(extraction.text.as_str(), "Creatinine 88 umol/L");
    assert_eq!(session.document_name(), Some("renal.pdf"));
}
