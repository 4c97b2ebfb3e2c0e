//! Proprietor name extraction from register text
//!
//! Title registers state ownership as free text after a PROPRIETOR label:
//! one owner, joint owners at a shared address, or joint owners each with
//! their own address. The name/address boundary is inherently heuristic, so
//! boundary detection sits behind a strategy trait and can be replaced
//! without touching the extraction flow.
//!
//! Extraction failures are soft: the caller records the case without a
//! proprietor name.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lookahead window used when judging whether an "of" introduces an address
const ADDRESS_LOOKAHEAD_CHARS: usize = 100;

static PROPRIETOR_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)PROPRIETOR(?:\(S\))?\s*:").unwrap());

/// Entry boundaries within a register: the end-of-register marker or the
/// next dated entry, e.g. "3 (12.04.2021)"
static SPAN_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)end of (?:the )?register|\b\d+\s\(\d{2}\.\d{2}\.\d{4}\)").unwrap());

static UK_POSTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{1,2}[0-9][0-9A-Z]?\s?[0-9][A-Z]{2}\b").unwrap());

static CARE_OF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcare of\b").unwrap());

static ADDRESS_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(street|road|lane|avenue|close|drive|court|house|farm|park|way|place|gardens|terrace|crescent|building|buildings|estate|hill|green|square|row|mews|london)\b",
    )
    .unwrap()
});

/// Parenthetical annotations stripped from extracted names: company
/// registration numbers and incorporation markers
static REGISTRATION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)regn|registered|incorporat|company|oe id|\d{5,}").unwrap()
});

/// Strategy for locating where a name ends and its address begins.
/// Returns the byte offset of the boundary within `text`, or None when no
/// address can be recognized.
pub trait AddressBoundaryDetector: Send + Sync {
    fn boundary(&self, text: &str) -> Option<usize>;
}

/// Default detector: "care of" marker, then "of" followed by a street
/// number / postcode / address keyword within a bounded lookahead, then the
/// last "of" preceding any postcode in the text.
pub struct KeywordBoundaryDetector;

impl AddressBoundaryDetector for KeywordBoundaryDetector {
    fn boundary(&self, text: &str) -> Option<usize> {
        if let Some(marker) = CARE_OF.find(text) {
            return Some(marker.start());
        }

        for (index, _) in text.match_indices(" of ") {
            let after = &text[index + 4..];
            if after
                .trim_start()
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
            {
                return Some(index + 1);
            }
            let window = char_prefix(after, ADDRESS_LOOKAHEAD_CHARS);
            if UK_POSTCODE.is_match(window) || ADDRESS_KEYWORD.is_match(window) {
                return Some(index + 1);
            }
        }

        if let Some(postcode) = UK_POSTCODE.find(text) {
            if let Some(index) = text[..postcode.start()].rfind(" of ") {
                return Some(index + 1);
            }
        }

        None
    }
}

/// Prefix of `text` at most `max` bytes long, cut on a char boundary
fn char_prefix(text: &str, max: usize) -> &str {
    match text.char_indices().find(|(i, _)| *i >= max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Rule-based proprietor name extractor
pub struct ProprietorExtractor {
    detector: Box<dyn AddressBoundaryDetector>,
}

impl Default for ProprietorExtractor {
    fn default() -> Self {
        Self::with_detector(Box::new(KeywordBoundaryDetector))
    }
}

impl ProprietorExtractor {
    pub fn with_detector(detector: Box<dyn AddressBoundaryDetector>) -> Self {
        Self { detector }
    }

    /// Extract the proprietor name(s) from normalized register text.
    /// `doc_id` is used only for diagnostics.
    pub fn extract(&self, text: &str, doc_id: &str) -> Option<String> {
        let span = self.proprietor_span(text)?;
        if span.is_empty() {
            tracing::debug!(doc_id, "Proprietor label present but entry is empty");
            return None;
        }

        let segments = split_on_name_conjunctions(span);
        let boundaries: Vec<Option<usize>> = segments
            .iter()
            .map(|segment| self.detector.boundary(segment))
            .collect();
        let addressed = boundaries.iter().filter(|b| b.is_some()).count();

        let name = if segments.len() > 1 && addressed > 1 {
            // Joint owners, each with their own address
            let names: Vec<&str> = segments
                .iter()
                .zip(&boundaries)
                .map(|(segment, boundary)| match boundary {
                    Some(end) => segment[..*end].trim(),
                    None => segment.trim(),
                })
                .filter(|name| !name.is_empty())
                .collect();
            names.join(" and ")
        } else {
            // Single owner, or joint owners sharing one address
            match self.detector.boundary(span) {
                Some(end) => span[..end].trim().to_string(),
                None => {
                    tracing::debug!(doc_id, "No address boundary found, keeping full entry");
                    span.trim().to_string()
                }
            }
        };

        let cleaned = clean_name(&name);
        if cleaned.is_empty() {
            tracing::debug!(doc_id, "Proprietor name empty after cleaning");
            None
        } else {
            Some(cleaned)
        }
    }

    /// Text between the proprietor label and the next register entry or
    /// end-of-register marker
    fn proprietor_span<'a>(&self, text: &'a str) -> Option<&'a str> {
        let label = PROPRIETOR_LABEL.find(text)?;
        let rest = &text[label.end()..];
        let end = SPAN_END.find(rest).map(|m| m.start()).unwrap_or(rest.len());
        Some(rest[..end].trim())
    }
}

/// Split on " and " boundaries that precede a capitalized continuation.
/// "JANE DOE and JOHN DOE of ..." splits between the two names; an "and"
/// inside an address ("Dog and Duck Cottage") followed by lowercase does
/// not split.
fn split_on_name_conjunctions(span: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (index, _) in span.match_indices(" and ") {
        if index < start {
            continue;
        }
        let follows = &span[index + 5..];
        if follows.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            segments.push(&span[start..index]);
            start = index + 5;
        }
    }
    segments.push(&span[start..]);
    segments
}

/// Strip registration parentheticals, trailing punctuation, and a dangling
/// "of"; collapse whitespace
fn clean_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close_offset) => {
                let inner = &rest[open + 1..open + close_offset];
                if REGISTRATION_MARKER.is_match(inner) {
                    result.push_str(&rest[..open]);
                } else {
                    result.push_str(&rest[..open + close_offset + 1]);
                }
                rest = &rest[open + close_offset + 1..];
            }
            None => break,
        }
    }
    result.push_str(rest);

    let collapsed = result.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut trimmed = collapsed.trim_end_matches([',', '.', ';', ':']).trim().to_string();
    if let Some(stripped) = trimmed.strip_suffix(" of") {
        trimmed = stripped.trim_end().to_string();
    }
    trimmed
}
