//! Title deed archive extraction
//!
//! The authority sends proof-of-title documents as one zip archive, one PDF
//! per title. Entries are keyed by their uppercased file stem, which is the
//! title number used to join documents back to spreadsheet rows.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use titlecheck_common::{Error, Result};

/// File extensions treated as title documents
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// Extract document entries from zip bytes, keyed by uppercased file stem.
/// Directories and non-document entries are skipped.
pub fn extract_documents(bytes: &[u8]) -> Result<HashMap<String, Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::ArchiveUnreadable(e.to_string()))?;

    let mut documents = HashMap::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::ArchiveUnreadable(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let path = Path::new(&name);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        if !matches!(extension.as_deref(), Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext)) {
            tracing::debug!(entry = %name, "Skipping non-document archive entry");
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let mut content = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::ArchiveUnreadable(e.to_string()))?;
        documents.insert(stem.to_uppercase(), content);
    }

    Ok(documents)
}
