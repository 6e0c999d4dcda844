//! Text extraction from the submitted specification.
//!
//! An uploaded PDF wins over the raw text field. Either way the result is
//! passed through encoding normalization.

use lopdf::Document;
use tracing::{debug, warn};

use crate::domain::encoding::normalize_text;
use crate::errors::{BacklogError, BacklogResult};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Specification as submitted: a document, raw text, or both.
#[derive(Debug, Clone, Default)]
pub struct ExtractionInput {
    pub raw_text: Option<String>,
    pub document: Option<Vec<u8>>,
}

impl ExtractionInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            raw_text: Some(text.into()),
            document: None,
        }
    }

    pub fn from_document(bytes: Vec<u8>) -> Self {
        Self {
            raw_text: None,
            document: Some(bytes),
        }
    }
}

/// Yield the plain text of the specification.
///
/// Returns an empty string when nothing was submitted; emptiness is the
/// caller's validation concern.
pub fn extract_text(input: &ExtractionInput) -> BacklogResult<String> {
    match (&input.document, &input.raw_text) {
        (Some(bytes), _) if !bytes.is_empty() => extract_pdf_text(bytes),
        (_, Some(text)) => Ok(normalize_text(text)),
        _ => Ok(String::new()),
    }
}

/// Extract the text of every page, in page order.
pub fn extract_pdf_text(bytes: &[u8]) -> BacklogResult<String> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(BacklogError::Extraction {
            reason: "uploaded document is not a PDF".to_string(),
        });
    }

    let document = Document::load_mem(bytes).map_err(|e| BacklogError::Extraction {
        reason: format!("unreadable PDF: {e}"),
    })?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(BacklogError::Extraction {
            reason: "PDF has no pages".to_string(),
        });
    }

    let mut texts = Vec::with_capacity(pages.len());
    let mut failed = 0usize;
    for &page_number in pages.keys() {
        match document.extract_text(&[page_number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                failed += 1;
                warn!(page = page_number, error = %e, "Failed to extract text from PDF page");
            }
        }
    }

    if texts.is_empty() {
        return Err(BacklogError::Extraction {
            reason: format!("no text could be extracted from {failed} page(s)"),
        });
    }

    debug!(pages = pages.len(), failed, "Extracted PDF text");
    Ok(normalize_text(texts.join("\n").trim()))
}
