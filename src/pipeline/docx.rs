//! Native Word (DOCX) extraction: the body paragraph stream.
//!
//! Only top-level body paragraphs are read, in document order, and joined with
//! newlines. Empty paragraphs are kept so vertical spacing survives. Tables,
//! headers, footers and text boxes are not extracted.

use crate::pipeline::NativeOutcome;
use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, Run, RunChild};
use tracing::debug;

/// Parse DOCX bytes and return the joined paragraph text.
pub fn extract_native(bytes: &[u8]) -> NativeOutcome {
    let docx = match read_docx(bytes) {
        Ok(docx) => docx,
        Err(e) => return NativeOutcome::StructuralError(e.to_string()),
    };

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(paragraph_text(para)),
            _ => None,
        })
        .collect();

    debug!("DOCX: {} body paragraphs", paragraphs.len());
    NativeOutcome::from_text(paragraphs.join("\n"))
}

fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    push_children(&para.children, &mut text);
    text
}

fn push_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, out),
            ParagraphChild::Hyperlink(link) => push_children(&link.children, out),
            _ => {}
        }
    }
}

fn push_run(run: &Run, out: &mut String) {
    for child in &run.children {
        match child {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) => out.push('\t'),
            RunChild::Break(_) => out.push('\n'),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::Docx;
    use std::io::Cursor;

    fn build(paragraphs: &[&[&str]]) -> Vec<u8> {
        let mut docx = Docx::new();
        for runs in paragraphs {
            let mut para = Paragraph::new();
            for text in *runs {
                para = para.add_run(Run::new().add_text(*text));
            }
            docx = docx.add_paragraph(para);
        }
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).expect("pack docx");
        buf.into_inner()
    }

    #[test]
    fn paragraphs_joined_by_newline() {
        let bytes = build(&[&["Patient: Jane Doe"], &["Hemoglobin ", "10.1 g/dL"]]);
        assert_eq!(
            extract_native(&bytes),
            NativeOutcome::Success("Patient: Jane Doe\nHemoglobin 10.1 g/dL".into())
        );
    }

    #[test]
    fn empty_paragraphs_are_kept() {
        let bytes = build(&[&["Findings"], &[], &["Normal"]]);
        assert_eq!(
            extract_native(&bytes),
            NativeOutcome::Success("Findings\n\nNormal".into())
        );
    }

    #[test]
    fn document_without_text_is_empty() {
        let bytes = build(&[&[], &[]]);
        assert_eq!(extract_native(&bytes), NativeOutcome::EmptyResult);
    }

    #[test]
    fn non_zip_bytes_are_structural_error() {
        assert!(matches!(
            extract_native(b"this is not a docx"),
            NativeOutcome::StructuralError(_)
        ));
    }
}
