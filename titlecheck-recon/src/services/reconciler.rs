//! Response pair reconciliation
//!
//! Consumes one declared pair: parses both attachments, joins extracted
//! title documents to spreadsheet rows, matches rows to open case records,
//! applies a batched partial-tolerant bulk update, persists the run
//! summary, then cleans up transient state and files the source messages.
//!
//! Failure granularity follows the pipeline's error taxonomy: attachment
//! parse failures are pair-fatal, row-level problems are logged and
//! skip-counted, a missing proprietor name is only a diagnostic.

use crate::clients::{CaseStore, Mailbox, ObjectStore};
use crate::paths;
use crate::services::{archive, cleanup, proprietor::ProprietorExtractor, spreadsheet, text_extractor};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use titlecheck_common::models::{
    normalize_postcode, CaseRecord, CaseUpdate, PairDescriptor, ProcessingResult, ResponseRow,
    RowStatus,
};
use titlecheck_common::{Error, Result, Settings};

/// Archived document detail joined back to a response row
struct TitleDetail {
    url: String,
    proprietor_name: Option<String>,
}

pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    cases: Arc<dyn CaseStore>,
    mailbox: Arc<dyn Mailbox>,
    extractor: ProprietorExtractor,
    settings: Settings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        cases: Arc<dyn CaseStore>,
        mailbox: Arc<dyn Mailbox>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            cases,
            mailbox,
            extractor: ProprietorExtractor::default(),
            settings,
        }
    }

    /// Process one pair end to end, bounded by the configured deadline.
    ///
    /// Always persists a ProcessingResult and runs cleanup/foldering,
    /// except on the fail-fast path: a pair whose transient blobs are
    /// already gone was processed by an earlier delivery, and re-running
    /// cleanup or foldering for it would be wrong.
    pub async fn reconcile(&self, descriptor: &PairDescriptor) -> Result<ProcessingResult> {
        let started = Utc::now();
        let deadline = Duration::from_secs(self.settings.reconcile_deadline_secs);

        let outcome = tokio::time::timeout(deadline, self.process_pair(descriptor, started)).await;
        let (result, fatal) = match outcome {
            Ok(Ok(result)) => (result, None),
            Ok(Err(Error::NotFound(detail))) => {
                tracing::warn!(
                    pair_id = %descriptor.pair_id,
                    "Pair blobs already cleaned, skipping re-delivery: {}", detail
                );
                return Err(Error::NotFound(detail));
            }
            Ok(Err(e)) => {
                tracing::error!(pair_id = %descriptor.pair_id, "Pair failed: {}", e);
                (failure_result(descriptor, started, &e), Some(e))
            }
            Err(_) => {
                let e = Error::Timeout(format!(
                    "reconciliation exceeded {}s",
                    self.settings.reconcile_deadline_secs
                ));
                tracing::error!(pair_id = %descriptor.pair_id, "{}", e);
                (failure_result(descriptor, started, &e), Some(e))
            }
        };

        self.persist_result(&result).await;

        if let Err(e) = cleanup::delete_transient_state(self.store.as_ref(), descriptor).await {
            tracing::warn!(pair_id = %descriptor.pair_id, "Transient cleanup incomplete: {}", e);
        }
        cleanup::file_messages(self.mailbox.as_ref(), &self.settings, descriptor, result.success)
            .await;

        match fatal {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    async fn process_pair(
        &self,
        descriptor: &PairDescriptor,
        started: DateTime<Utc>,
    ) -> Result<ProcessingResult> {
        tracing::info!(pair_id = %descriptor.pair_id, "Reconciling authority response pair");

        let sheet_bytes = self.store.get(&descriptor.spreadsheet.attachment_path).await?;
        let rows = spreadsheet::parse_response_sheet(&sheet_bytes)?;
        let zip_bytes = self.store.get(&descriptor.archive.attachment_path).await?;
        let documents = archive::extract_documents(&zip_bytes)?;
        tracing::info!(
            pair_id = %descriptor.pair_id,
            rows = rows.len(),
            documents = documents.len(),
            "Parsed response attachments"
        );

        let mut errors: Vec<String> = Vec::new();

        // Archive every document a row refers to; extract proprietor names
        let wanted: HashSet<String> = rows
            .iter()
            .filter(|r| !r.title_number.is_empty())
            .map(|r| r.title_number.to_uppercase())
            .collect();
        let mut title_details: HashMap<String, TitleDetail> = HashMap::new();
        for (title, bytes) in &documents {
            if !wanted.contains(title) {
                tracing::debug!(title, "Archive document matches no response row");
                continue;
            }
            match self.archive_title_document(title, bytes).await {
                Ok(detail) => {
                    title_details.insert(title.clone(), detail);
                }
                Err(e) => errors.push(format!("title {}: {}", title, e)),
            }
        }

        // Match rows to open cases and build the update set
        let references: Vec<String> = rows
            .iter()
            .map(|r| r.reference.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let mut pool = self.cases.query_submitted(&references).await?;
        tracing::debug!(
            candidates = pool.len(),
            references = references.len(),
            "Loaded open cases for matching"
        );

        let received_at = descriptor.spreadsheet.received_at;
        let mut updates: Vec<CaseUpdate> = Vec::new();
        let mut skipped = 0usize;
        for row in &rows {
            match build_update(row, &mut pool, &title_details, received_at) {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {
                    skipped += 1;
                    tracing::info!(reference = %row.reference, "No open case for response row");
                }
                Err(e) => {
                    skipped += 1;
                    errors.push(format!("row {}: {}", row.reference, e));
                }
            }
        }

        // Batched bulk update; a rejected record or failed batch never
        // aborts the others
        let mut updated = 0usize;
        for chunk in updates.chunks(self.settings.update_batch_size) {
            match self.cases.bulk_update(chunk).await {
                Ok(accepted) => {
                    if accepted < chunk.len() {
                        tracing::warn!(
                            accepted,
                            sent = chunk.len(),
                            "Store rejected part of an update batch"
                        );
                    }
                    updated += accepted;
                }
                Err(e) => errors.push(format!("update batch failed: {}", e)),
            }
        }

        let result = ProcessingResult {
            pair_id: descriptor.pair_id.clone(),
            total_rows: rows.len(),
            matched: count_status(&rows, RowStatus::Matched),
            under_review: count_status(&rows, RowStatus::UnderReview),
            no_match: count_status(&rows, RowStatus::NoMatch),
            skipped,
            updated,
            errors,
            success: true,
            started_at: started,
            finished_at: Utc::now(),
        };
        tracing::info!(
            pair_id = %result.pair_id,
            total = result.total_rows,
            matched = result.matched,
            under_review = result.under_review,
            no_match = result.no_match,
            skipped = result.skipped,
            updated = result.updated,
            "Reconciliation complete"
        );
        Ok(result)
    }

    /// Store one title document permanently, issue a read URL, and attempt
    /// proprietor extraction. An unreadable document only costs the name.
    async fn archive_title_document(&self, title: &str, bytes: &[u8]) -> Result<TitleDetail> {
        let path = paths::title_document_path(title);
        self.store.put(&path, bytes).await?;
        let ttl = Duration::from_secs(self.settings.read_url_ttl_mins * 60);
        let url = self.store.read_url(&path, ttl).await?;

        let proprietor_name = match text_extractor::extract_text(bytes) {
            Ok(text) => self.extractor.extract(&text, title),
            Err(e) => {
                tracing::debug!(title, "Title document text unavailable: {}", e);
                None
            }
        };

        Ok(TitleDetail {
            url,
            proprietor_name,
        })
    }

    async fn persist_result(&self, result: &ProcessingResult) {
        let body = match serde_json::to_vec_pretty(result) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(pair_id = %result.pair_id, "Cannot serialize result: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.put(&paths::result_path(&result.pair_id), &body).await {
            tracing::error!(pair_id = %result.pair_id, "Cannot persist result: {}", e);
        }
    }
}

fn count_status(rows: &[ResponseRow], status: RowStatus) -> usize {
    rows.iter().filter(|r| r.status == status).count()
}

/// Build the update for one row, consuming its matched case from the pool.
/// Ok(None) means no open case exists for the row (legitimate, skipped);
/// Err means the row itself is malformed.
fn build_update(
    row: &ResponseRow,
    pool: &mut Vec<CaseRecord>,
    title_details: &HashMap<String, TitleDetail>,
    received_at: DateTime<Utc>,
) -> std::result::Result<Option<CaseUpdate>, String> {
    if row.status != RowStatus::NoMatch && row.title_number.is_empty() {
        return Err("property matched but no title number assigned".to_string());
    }

    let Some(case) = match_row_to_case(row, pool) else {
        return Ok(None);
    };

    let detail = title_details.get(&row.title_number.to_uppercase());
    Ok(Some(CaseUpdate {
        id: case.id,
        status: row.status.as_store_status().to_string(),
        match_type: row.match_type.clone(),
        title_number: (!row.title_number.is_empty()).then(|| row.title_number.clone()),
        title_url: detail.map(|d| d.url.clone()),
        proprietor_name: detail.and_then(|d| d.proprietor_name.clone()),
        response_received: received_at,
    }))
}

/// Reference-key match with postcode disambiguation. The matched case is
/// removed from the pool so no case is updated twice within one pair.
fn match_row_to_case(row: &ResponseRow, pool: &mut Vec<CaseRecord>) -> Option<CaseRecord> {
    let candidates: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, case)| case.reference == row.reference)
        .map(|(index, _)| index)
        .collect();

    let chosen = match candidates.len() {
        0 => return None,
        1 => candidates[0],
        _ => {
            let wanted = normalize_postcode(&row.postcode);
            let by_postcode: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&index| {
                    pool[index]
                        .postcode
                        .as_deref()
                        .map(normalize_postcode)
                        .is_some_and(|pc| pc == wanted)
                })
                .collect();
            if by_postcode.len() == 1 {
                by_postcode[0]
            } else {
                tracing::warn!(
                    reference = %row.reference,
                    candidates = candidates.len(),
                    "Ambiguous reference, falling back to first open case"
                );
                candidates[0]
            }
        }
    };

    Some(pool.remove(chosen))
}

fn failure_result(
    descriptor: &PairDescriptor,
    started: DateTime<Utc>,
    error: &Error,
) -> ProcessingResult {
    ProcessingResult {
        pair_id: descriptor.pair_id.clone(),
        total_rows: 0,
        matched: 0,
        under_review: 0,
        no_match: 0,
        skipped: 0,
        updated: 0,
        errors: vec![error.to_string()],
        success: false,
        started_at: started,
        finished_at: Utc::now(),
    }
}
