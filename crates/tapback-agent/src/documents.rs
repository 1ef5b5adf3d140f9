// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local PDF text extraction, used when file upload is unavailable.

use std::path::Path;

use lopdf::Document;
use tapback_core::TapbackError;
use tracing::{debug, warn};

/// Character budget for extracted document text.
pub const MAX_DOCUMENT_CHARS: usize = 30_000;

/// Extract page text in page order until `max_chars` is reached.
///
/// Pages are trimmed and joined with blank lines. Encrypted documents are
/// tried with an empty password.
pub fn extract_pdf_text(bytes: &[u8], max_chars: usize) -> Result<String, TapbackError> {
    let mut document = Document::load_mem(bytes)
        .map_err(|e| TapbackError::InvalidInput(format!("failed to load PDF: {e}")))?;
    if document.is_encrypted() && document.decrypt("").is_err() {
        return Err(TapbackError::InvalidInput(
            "cannot decrypt password-protected PDF".into(),
        ));
    }
    let () = document.decompress();

    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut pages = Vec::new();
    let mut total = 0usize;
    for page in page_numbers {
        let Ok(text) = document.extract_text(&[page]) else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        total += trimmed.chars().count();
        pages.push(trimmed.to_string());
        if total > max_chars {
            break;
        }
    }

    let joined = pages.join("\n\n");
    Ok(truncate_chars(&joined, max_chars).trim().to_string())
}

/// Read and extract a PDF off the async runtime. Unreadable files yield an
/// empty string.
pub async fn read_pdf_text(path: &Path) -> String {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read PDF");
            return String::new();
        }
    };
    let shown = path.display().to_string();
    match tokio::task::spawn_blocking(move || extract_pdf_text(&bytes, MAX_DOCUMENT_CHARS)).await {
        Ok(Ok(text)) => {
            debug!(path = %shown, chars = text.len(), "extracted PDF text");
            text
        }
        Ok(Err(e)) => {
            warn!(path = %shown, error = %e, "PDF text extraction failed");
            String::new()
        }
        Err(e) => {
            warn!(path = %shown, error = %e, "PDF extraction task failed");
            String::new()
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn hello_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn extracts_pages_in_order() {
        let text = extract_pdf_text(&hello_pdf(&["Hello World", "Second page"]), 1000).unwrap();
        let first = text.find("Hello World").unwrap();
        let second = text.find("Second page").unwrap();
        assert!(first < second);
    }

    #[test]
    fn respects_character_budget() {
        let text = extract_pdf_text(&hello_pdf(&["Hello World", "Second page"]), 5).unwrap();
        assert!(text.chars().count() <= 5);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(extract_pdf_text(b"not a pdf", 100).is_err());
    }

    #[tokio::test]
    async fn unreadable_file_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("scan.pdf");
        std::fs::write(&bogus, b"%PDF-garbage").unwrap();
        assert_eq!(read_pdf_text(&bogus).await, "");
        assert_eq!(read_pdf_text(&dir.path().join("missing.pdf")).await, "");
    }

    #[tokio::test]
    async fn reads_pdf_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, hello_pdf(&["Quarterly notes"])).unwrap();
        assert!(read_pdf_text(&path).await.contains("Quarterly notes"));
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
