//! Inbox polling and response pairing
//!
//! Each cycle ingests unread authority messages into transient storage,
//! then re-scans all persisted metadata for an unclaimed spreadsheet and an
//! unclaimed archive whose receipt times fall within the pairing window.
//! A qualifying pair is claimed atomically (put-if-absent on the pair
//! record) before dispatch, so a racing instance or a re-delivered trigger
//! cannot process it twice.
//!
//! Mailbox errors abort the cycle; the timer is the retry mechanism.

use crate::clients::{MailAttachment, Mailbox, ObjectStore};
use crate::paths;
use crate::services::reconciler::Reconciler;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use titlecheck_common::models::{MessageKind, PairDescriptor, PendingMessage};
use titlecheck_common::{Error, Result, Settings};

/// Attachment extensions classified as a results spreadsheet. Encrypted
/// message containers are ingested as spreadsheets and fail at parse time,
/// which correctly fails the whole pair.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv", "p7m", "rpmsg"];

/// Attachment extensions classified as a title deeds archive
const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// Outcome counts for one polling cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub ingested: usize,
    pub unclassified: usize,
    pub pairs_processed: usize,
}

pub struct InboxWatcher {
    mailbox: Arc<dyn Mailbox>,
    store: Arc<dyn ObjectStore>,
    reconciler: Arc<Reconciler>,
    settings: Settings,
}

impl InboxWatcher {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        store: Arc<dyn ObjectStore>,
        reconciler: Arc<Reconciler>,
        settings: Settings,
    ) -> Self {
        Self {
            mailbox,
            store,
            reconciler,
            settings,
        }
    }

    /// One polling cycle: ingest unread messages, then pair and process.
    /// The manual trigger runs exactly this.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let (ingested, unclassified) = self.ingest_unread().await?;
        let pairs_processed = self.pair_pending().await?;
        Ok(CycleSummary {
            ingested,
            unclassified,
            pairs_processed,
        })
    }

    /// Re-dispatch pair declarations left behind by a previous run.
    /// Processing is idempotent: a pair whose transient blobs are already
    /// gone fails fast and its stale declaration is dropped.
    pub async fn recover_pairs(&self) -> Result<usize> {
        let mut recovered = 0;
        for path in self.store.list_prefix("pairs").await? {
            let bytes = match self.store.get(&path).await {
                Ok(bytes) => bytes,
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let descriptor: PairDescriptor = match serde_json::from_slice(&bytes) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!(path = %path, "Dropping unreadable pair record: {}", e);
                    self.store.delete(&path).await?;
                    continue;
                }
            };

            tracing::info!(pair_id = %descriptor.pair_id, "Recovering unfinished pair");
            match self.reconciler.reconcile(&descriptor).await {
                Ok(_) => recovered += 1,
                Err(Error::NotFound(_)) => {
                    // Already processed by an earlier delivery
                    self.store.delete(&path).await?;
                }
                Err(e) => {
                    tracing::error!(pair_id = %descriptor.pair_id, "Recovery failed: {}", e);
                }
            }
        }
        Ok(recovered)
    }

    async fn ingest_unread(&self) -> Result<(usize, usize)> {
        let messages = self
            .mailbox
            .list_unread(&self.settings.authority_senders)
            .await?;
        tracing::debug!(count = messages.len(), "Unread authority messages");

        let mut ingested = 0;
        let mut unclassified = 0;
        for message in messages {
            let Some((kind, attachment)) = classify_attachments(&message.attachments) else {
                // Left unread; retried next cycle in case attachments arrive late
                tracing::warn!(
                    message_id = %message.id,
                    subject = %message.subject,
                    "Unclassifiable authority message, skipping"
                );
                unclassified += 1;
                continue;
            };

            let attachment_path = paths::attachment_path(&message.id, &attachment.name);
            self.store.put(&attachment_path, &attachment.bytes).await?;

            let pending = PendingMessage {
                message_id: message.id.clone(),
                subject: message.subject.clone(),
                received_at: message.received_at,
                from_address: message.from_address.clone(),
                kind,
                attachment_name: attachment.name.clone(),
                attachment_path,
            };
            self.store
                .put(&paths::meta_path(&message.id), &serde_json::to_vec_pretty(&pending)?)
                .await?;
            self.mailbox.mark_read(&message.id).await?;

            tracing::info!(
                message_id = %message.id,
                kind = ?kind,
                attachment = %pending.attachment_name,
                "Ingested authority message"
            );
            ingested += 1;
        }
        Ok((ingested, unclassified))
    }

    /// Scan all persisted metadata (every cycle, not just this one) for
    /// unclaimed pairs. First match wins; a claimed archive leaves the pool
    /// for the rest of the cycle.
    async fn pair_pending(&self) -> Result<usize> {
        let pending = self.load_unclaimed().await?;
        let spreadsheets: Vec<&PendingMessage> = pending
            .iter()
            .filter(|m| m.kind == MessageKind::ResultsSpreadsheet)
            .collect();
        let archives: Vec<&PendingMessage> = pending
            .iter()
            .filter(|m| m.kind == MessageKind::DocumentsArchive)
            .collect();

        let window = chrono::Duration::hours(self.settings.pairing_window_hours);
        let mut used: HashSet<&str> = HashSet::new();
        let mut processed = 0;

        for sheet in spreadsheets {
            let partner = archives.iter().find(|a| {
                !used.contains(a.message_id.as_str())
                    && (a.received_at - sheet.received_at).abs() <= window
            });
            let Some(partner) = partner else {
                tracing::debug!(
                    message_id = %sheet.message_id,
                    "No archive within pairing window yet"
                );
                continue;
            };
            used.insert(partner.message_id.as_str());

            let descriptor = PairDescriptor::new(sheet.clone(), (*partner).clone());
            if !self
                .store
                .put_if_absent(
                    &paths::pair_path(&descriptor.pair_id),
                    &serde_json::to_vec_pretty(&descriptor)?,
                )
                .await?
            {
                tracing::debug!(pair_id = %descriptor.pair_id, "Pair already claimed");
                continue;
            }
            self.store
                .put(&paths::claimed_path(&sheet.message_id), b"")
                .await?;
            self.store
                .put(&paths::claimed_path(&partner.message_id), b"")
                .await?;
            tracing::info!(
                pair_id = %descriptor.pair_id,
                spreadsheet = %sheet.message_id,
                archive = %partner.message_id,
                "Declared response pair"
            );

            match self.reconciler.reconcile(&descriptor).await {
                Ok(result) => {
                    tracing::info!(
                        pair_id = %result.pair_id,
                        updated = result.updated,
                        "Pair processed"
                    );
                }
                Err(e) => {
                    tracing::error!(pair_id = %descriptor.pair_id, "Pair processing failed: {}", e);
                }
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// Load pending metadata across all cycles, skipping claimed messages
    /// and unreadable records
    async fn load_unclaimed(&self) -> Result<Vec<PendingMessage>> {
        let mut pending = Vec::new();
        for path in self.store.list_prefix("pending").await? {
            if !path.ends_with("/meta.json") || path.contains("/attachments/") {
                continue;
            }
            let bytes = match self.store.get(&path).await {
                Ok(bytes) => bytes,
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let message: PendingMessage = match serde_json::from_slice(&bytes) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(path = %path, "Unreadable pending metadata: {}", e);
                    continue;
                }
            };
            if self
                .store
                .exists(&paths::claimed_path(&message.message_id))
                .await?
            {
                continue;
            }
            pending.push(message);
        }
        Ok(pending)
    }
}

/// Classify a message by its attachments. The first attachment matching a
/// known extension determines the kind and is the one persisted.
fn classify_attachments(
    attachments: &[MailAttachment],
) -> Option<(MessageKind, &MailAttachment)> {
    for attachment in attachments {
        let extension = attachment
            .name
            .rsplit('.')
            .next()
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
            return Some((MessageKind::ResultsSpreadsheet, attachment));
        }
        if ARCHIVE_EXTENSIONS.contains(&extension.as_str()) {
            return Some((MessageKind::DocumentsArchive, attachment));
        }
    }
    None
}
