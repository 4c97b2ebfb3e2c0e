//! Object-store path layout
//!
//! Transient state:
//!   pending/{id}/meta.json            message metadata
//!   pending/{id}/attachments/{name}   attachment bytes
//!   pending/{id}/claimed              pairing claim marker
//!   pairs/{pair_id}.json              pair declaration / dispatch claim
//!   results/{pair_id}.json            processing summary for the notifier
//! Permanent:
//!   titles/{TITLE}.pdf         archived proof-of-title documents

use titlecheck_common::models::storage_id;

pub fn pending_prefix(message_id: &str) -> String {
    format!("pending/{}", storage_id(message_id))
}

pub fn meta_path(message_id: &str) -> String {
    format!("{}/meta.json", pending_prefix(message_id))
}

// Attachments live in their own directory so no attachment name can land
// on the metadata or claim-marker path
pub fn attachment_path(message_id: &str, attachment_name: &str) -> String {
    format!(
        "{}/attachments/{}",
        pending_prefix(message_id),
        safe_name(attachment_name)
    )
}

pub fn claimed_path(message_id: &str) -> String {
    format!("{}/claimed", pending_prefix(message_id))
}

pub fn pair_path(pair_id: &str) -> String {
    format!("pairs/{}.json", pair_id)
}

pub fn result_path(pair_id: &str) -> String {
    format!("results/{}.json", pair_id)
}

pub fn title_document_path(title_number: &str) -> String {
    format!("titles/{}.pdf", safe_name(title_number))
}

/// Restrict a filename to characters safe for every storage backend
fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_paths_share_one_prefix() {
        let prefix = pending_prefix("AAMk/AGI2=");
        assert!(meta_path("AAMk/AGI2=").starts_with(&prefix));
        assert!(attachment_path("AAMk/AGI2=", "results.xlsx").starts_with(&prefix));
        assert!(claimed_path("AAMk/AGI2=").starts_with(&prefix));
    }

    #[test]
    fn attachment_names_are_sanitized() {
        let path = attachment_path("m1", "week 32/results.xlsx");
        assert!(path.starts_with(&pending_prefix("m1")));
        assert!(path.ends_with("/attachments/week_32_results.xlsx"));
    }

    #[test]
    fn attachment_named_like_bookkeeping_files_does_not_collide() {
        assert_ne!(attachment_path("m1", "meta.json"), meta_path("m1"));
        assert_ne!(attachment_path("m1", "claimed"), claimed_path("m1"));
    }

    #[test]
    fn distinct_message_ids_get_distinct_prefixes() {
        // Provider ids share a long head and differ near the tail
        let prefix = "AAMkADNkNmViZjMxLTg3ZDItNGQyZC1hNzM2LWRjOTY0YWQ5MzEzZgBGAAAAAABnJYQ4wHl9TqKqKc2pd3dGBwDc";
        let sheet = format!("{}AAA=", prefix);
        let archive = format!("{}BBB=", prefix);
        assert_ne!(pending_prefix(&sheet), pending_prefix(&archive));
        assert_ne!(meta_path(&sheet), meta_path(&archive));
    }

    #[test]
    fn title_path_uses_the_title_number() {
        assert_eq!(title_document_path("AB123456"), "titles/AB123456.pdf");
    }
}
