//! Domain models shared across the verification pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Store status of a case awaiting an authority response
pub const STATUS_SUBMITTED: &str = "Submitted";

/// Classification of an authority response message by attachment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Spreadsheet of per-case match results
    ResultsSpreadsheet,
    /// Compressed archive of proof-of-title documents
    DocumentsArchive,
}

/// An ingested inbox message awaiting pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMessage {
    /// Opaque mailbox message identifier
    pub message_id: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub from_address: String,
    pub kind: MessageKind,
    /// Name of the attachment that determined the classification
    pub attachment_name: String,
    /// Object-store path holding the attachment bytes
    pub attachment_path: String,
}

/// Two pending messages declared as one logical authority response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairDescriptor {
    pub pair_id: String,
    pub spreadsheet: PendingMessage,
    pub archive: PendingMessage,
    pub paired_at: DateTime<Utc>,
}

impl PairDescriptor {
    /// Declare a pair. The pair id is derived deterministically from the two
    /// message ids so re-delivery of the same trigger converges on the same
    /// claim key.
    pub fn new(spreadsheet: PendingMessage, archive: PendingMessage) -> Self {
        let pair_id = Self::derive_pair_id(&spreadsheet.message_id, &archive.message_id);
        Self {
            pair_id,
            spreadsheet,
            archive,
            paired_at: Utc::now(),
        }
    }

    fn derive_pair_id(a: &str, b: &str) -> String {
        format!("{}__{}", storage_id(a), storage_id(b))
    }
}

/// Path-safe storage key for an opaque mailbox message id. Provider ids
/// share a long mailbox prefix and differ only near the tail, so the key
/// is a digest of the full id rather than a sanitized prefix. The full id
/// lives in the persisted metadata.
pub fn storage_id(message_id: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(message_id.as_bytes()));
    digest[..32].to_string()
}

/// Outcome of one case verification, derived from the authority's two
/// match-result fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    /// Property and proprietor name both matched
    Matched,
    /// Property matched but the name did not; needs manual review
    UnderReview,
    /// Property did not match
    NoMatch,
}

impl RowStatus {
    /// Status string written to the case store
    pub fn as_store_status(&self) -> &'static str {
        match self {
            RowStatus::Matched => "Matched",
            RowStatus::UnderReview => "Under Review",
            RowStatus::NoMatch => "No Match",
        }
    }

    /// Derive status and match classification from the authority's
    /// address-match and name-match result fields. A non-match on the
    /// address always dominates.
    pub fn derive(address_match: &str, name_match: &str) -> (RowStatus, &'static str) {
        if !address_match.trim().eq_ignore_ascii_case("match") {
            (RowStatus::NoMatch, "No Property Match")
        } else if name_match.trim().eq_ignore_ascii_case("match") {
            (RowStatus::Matched, "Property and Person Match")
        } else {
            (RowStatus::UnderReview, "Property Only")
        }
    }
}

/// One parsed line of the authority result spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRow {
    /// External reference key echoed back by the authority (non-unique)
    pub reference: String,
    pub forename: String,
    pub surname: String,
    pub company_name: String,
    pub address_lines: [String; 5],
    pub postcode: String,
    pub address_match_result: String,
    pub name_match_result: String,
    /// Authority-assigned title number; empty when no property matched
    pub title_number: String,
    pub status: RowStatus,
    pub match_type: String,
}

/// Case record as read from the store (fields relevant to reconciliation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub reference: String,
    pub postcode: Option<String>,
    pub status: String,
}

/// Field set applied to one matched case record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseUpdate {
    pub id: String,
    pub status: String,
    pub match_type: String,
    pub title_number: Option<String>,
    pub title_url: Option<String>,
    pub proprietor_name: Option<String>,
    pub response_received: DateTime<Utc>,
}

/// Summary of one reconciliation run, persisted for the notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub pair_id: String,
    pub total_rows: usize,
    pub matched: usize,
    pub under_review: usize,
    pub no_match: usize,
    /// Rows skipped due to row-level failures or no open case
    pub skipped: usize,
    /// Updates acknowledged by the store across all batches
    pub updated: usize,
    pub errors: Vec<String>,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Normalize a postcode for comparison: strip spaces, uppercase
pub fn normalize_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation_covers_all_field_combinations() {
        // Non-match on address dominates regardless of the name field
        for name in ["Match", "NoMatch", ""] {
            for addr in ["NoMatch", "", "No Match"] {
                let (status, match_type) = RowStatus::derive(addr, name);
                assert_eq!(status, RowStatus::NoMatch);
                assert_eq!(match_type, "No Property Match");
            }
        }

        let (status, match_type) = RowStatus::derive("Match", "Match");
        assert_eq!(status, RowStatus::Matched);
        assert_eq!(match_type, "Property and Person Match");

        for name in ["NoMatch", ""] {
            let (status, match_type) = RowStatus::derive("Match", name);
            assert_eq!(status, RowStatus::UnderReview);
            assert_eq!(match_type, "Property Only");
        }
    }

    #[test]
    fn status_derivation_is_case_insensitive() {
        let (status, _) = RowStatus::derive("MATCH", "match");
        assert_eq!(status, RowStatus::Matched);
        let (status, _) = RowStatus::derive("match", "NOMATCH");
        assert_eq!(status, RowStatus::UnderReview);
    }

    #[test]
    fn pair_id_is_deterministic_and_path_safe() {
        let sheet = sample_message("AAMkAGI2-abc/def=", MessageKind::ResultsSpreadsheet);
        let zip = sample_message("AAMkAGI2-xyz/123=", MessageKind::DocumentsArchive);

        let a = PairDescriptor::new(sheet.clone(), zip.clone());
        let b = PairDescriptor::new(sheet, zip);
        assert_eq!(a.pair_id, b.pair_id);
        assert!(a.pair_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn storage_id_is_path_safe_and_deterministic() {
        let id = storage_id("AAMk/AGI2=TG-kA=");
        assert_eq!(id, storage_id("AAMk/AGI2=TG-kA="));
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn ids_sharing_a_long_prefix_get_distinct_storage_keys() {
        // Provider ids differ only near the tail
        let prefix = "AAMkADNkNmViZjMxLTg3ZDItNGQyZC1hNzM2LWRjOTY0YWQ5MzEzZgBGAAAAAABnJYQ4wHl9TqKqKc2pd3dGBwDc";
        let a = format!("{}AAA=", prefix);
        let b = format!("{}BBB=", prefix);
        assert_ne!(storage_id(&a), storage_id(&b));
    }

    #[test]
    fn normalize_postcode_strips_spaces_and_uppercases() {
        assert_eq!(normalize_postcode("ab1  2cd"), "AB12CD");
        assert_eq!(normalize_postcode(" LS1 1AA "), "LS11AA");
    }

    fn sample_message(id: &str, kind: MessageKind) -> PendingMessage {
        PendingMessage {
            message_id: id.to_string(),
            subject: "Results".to_string(),
            received_at: Utc::now(),
            from_address: "bulk.results@landregistry.example".to_string(),
            kind,
            attachment_name: "results.xlsx".to_string(),
            attachment_path: format!("pending/{}/results.xlsx", id),
        }
    }
}
