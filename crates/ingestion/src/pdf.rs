//! PDF text extraction module
//!
//! Extracts text content from PDF files using lopdf.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Extract the full text of a PDF, page by page.
///
/// Pages that fail to decode are skipped with a warning; a document with
/// no extractable text at all is an error.
pub fn extract_text(path: &Path) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (&page_num, _) in pages.iter() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract page text, skipping");
            }
        }
    }

    if text.trim().is_empty() {
        return Err(IngestionError::EmptyDocument(path.display().to_string()));
    }

    let cleaned = normalize_whitespace(&text);

    debug!(
        raw_len = text.len(),
        cleaned_len = cleaned.len(),
        "Text extraction complete"
    );

    Ok(cleaned)
}

/// Collapse runs of whitespace into single spaces
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let input = "Hello   World\n\nTest\tTabs";
        assert_eq!(normalize_whitespace(input), "Hello World Test Tabs");
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let err = extract_text(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, IngestionError::PdfParse { .. }));
    }
}
