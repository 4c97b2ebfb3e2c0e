//! Title document text extraction
//!
//! Produces one whitespace-normalized text blob from the raw bytes of a
//! proof-of-title PDF. An unreadable document is a soft failure for the
//! run: the caller proceeds without a proprietor name.

use titlecheck_common::{Error, Result};

/// Extract all page text from a PDF, collapsing whitespace runs to single
/// spaces
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::DocumentUnreadable(e.to_string()))?;
    Ok(normalize_whitespace(&raw))
}

/// Collapse all whitespace runs (including page breaks) to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
