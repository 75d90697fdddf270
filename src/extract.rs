//! PDF text extraction.
//!
//! Uploaded coursebooks arrive as raw bytes; this module turns them into
//! plain UTF-8 text ready for chunking. Extraction never panics: malformed
//! input is reported as an [`ExtractError`] and the coursebook is marked failed.

use thiserror::Error;

/// Every PDF file starts with this marker (possibly after a few junk bytes).
const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into the file the magic marker may appear.
const MAGIC_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a PDF file")]
    NotPdf,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Cheap format check used at upload time.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// Extract and normalize the text of a PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractError::NotPdf);
    }
    // pdf-extract panics on some malformed inputs instead of returning Err.
    let raw = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(normalize_text(&raw))
}

/// Normalize extracted text: LF line endings, no NUL or form-feed characters,
/// and at most one blank line between paragraphs.
pub fn normalize_text(raw: &str) -> String {
    let cleaned: String = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c != '\0' && *c != '\u{000C}')
        .collect();

    let mut out = String::with_capacity(cleaned.len());
    let mut newline_run = 0;
    for c in cleaned.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run > 2 {
                continue;
            }
        } else {
            newline_run = 0;
        }
        out.push(c);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_pdf_bytes_rejected() {
        assert!(!looks_like_pdf(b"hello world"));
        assert!(matches!(
            extract_pdf_text(b"not a valid pdf"),
            Err(ExtractError::NotPdf)
        ));
    }

    #[test]
    fn magic_detected_after_leading_junk() {
        assert!(looks_like_pdf(b"\xEF\xBB\xBF%PDF-1.7\n"));
    }

    #[test]
    fn truncated_pdf_returns_error() {
        let result = extract_pdf_text(b"%PDF-1.4\n1 0 obj garbage");
        assert!(matches!(result, Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn normalize_collapses_blank_runs_and_strips_controls() {
        let raw = "Chapter 1\r\n\r\n\r\n\r\nMotion\u{000C}\0 and forces\n\n\n";
        assert_eq!(normalize_text(raw), "Chapter 1\n\nMotion and forces");
    }
}
