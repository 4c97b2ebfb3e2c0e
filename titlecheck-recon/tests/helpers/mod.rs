//! In-memory collaborator fakes and fixture builders for pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::time::Duration;
use titlecheck_common::models::{CaseRecord, CaseUpdate, STATUS_SUBMITTED};
use titlecheck_common::{Error, Result, Settings};
use titlecheck_recon::clients::{CaseStore, MailAttachment, MailMessage, Mailbox, ObjectStore};
use tokio::sync::Mutex;
use zip::write::SimpleFileOptions;

/// Settings used across pipeline tests
pub fn test_settings() -> Settings {
    Settings {
        authority_senders: vec!["bulk.results@landregistry.example".to_string()],
        ..Settings::default()
    }
}

// ---------------------------------------------------------------------------
// Mailbox fake

struct StoredMessage {
    message: MailMessage,
    read: bool,
}

#[derive(Default)]
struct MailboxState {
    messages: Vec<StoredMessage>,
    /// (folder id, display name)
    folders: Vec<(String, String)>,
    /// (message id, folder id)
    moves: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MemoryMailbox {
    state: Mutex<MailboxState>,
}

impl MemoryMailbox {
    pub fn new(messages: Vec<MailMessage>) -> Self {
        Self {
            state: Mutex::new(MailboxState {
                messages: messages
                    .into_iter()
                    .map(|message| StoredMessage {
                        message,
                        read: false,
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    pub async fn unread_count(&self) -> usize {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| !m.read)
            .count()
    }

    /// Display name of the folder a message was moved to, if any
    pub async fn folder_of(&self, message_id: &str) -> Option<String> {
        let state = self.state.lock().await;
        let folder_id = state
            .moves
            .iter()
            .rev()
            .find(|(id, _)| id == message_id)
            .map(|(_, folder)| folder.clone())?;
        state
            .folders
            .iter()
            .find(|(id, _)| *id == folder_id)
            .map(|(_, name)| name.clone())
    }

    pub async fn move_count(&self) -> usize {
        self.state.lock().await.moves.len()
    }

    /// Deliver a new unread message, as if it arrived after startup
    pub async fn deliver(&self, message: MailMessage) {
        self.state.lock().await.messages.push(StoredMessage {
            message,
            read: false,
        });
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn list_unread(&self, senders: &[String]) -> Result<Vec<MailMessage>> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| !m.read && senders.contains(&m.message.from_address))
            .map(|m| m.message.clone())
            .collect())
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        match state
            .messages
            .iter_mut()
            .find(|m| m.message.id == message_id)
        {
            Some(message) => {
                message.read = true;
                Ok(())
            }
            None => Err(Error::Mailbox(format!("unknown message {}", message_id))),
        }
    }

    async fn find_folder(&self, display_name: &str) -> Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state
            .folders
            .iter()
            .find(|(_, name)| name == display_name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_folder(&self, display_name: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = format!("folder-{}", state.folders.len() + 1);
        state.folders.push((id.clone(), display_name.to_string()));
        Ok(id)
    }

    async fn move_message(&self, message_id: &str, folder_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .moves
            .push((message_id.to_string(), folder_id.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object store fake

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn get_raw(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, bytes: &[u8]) -> Result<bool> {
        let mut objects = self.objects.lock().await;
        if objects.contains_key(path) {
            return Ok(false);
        }
        objects.insert(path.to_string(), bytes.to_vec());
        Ok(true)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object not found: {}", path)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().await.remove(path);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let with_slash = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|k| k.starts_with(&with_slash) || *k == prefix)
            .cloned()
            .collect())
    }

    async fn read_url(&self, path: &str, ttl: Duration) -> Result<String> {
        if !self.objects.lock().await.contains_key(path) {
            return Err(Error::NotFound(format!("object not found: {}", path)));
        }
        Ok(format!("https://store.test/{}?ttl={}", path, ttl.as_secs()))
    }
}

// ---------------------------------------------------------------------------
// Case store fake

#[derive(Default)]
pub struct MemoryCaseStore {
    cases: Mutex<Vec<CaseRecord>>,
    batches: Mutex<Vec<Vec<CaseUpdate>>>,
    reject_ids: Mutex<HashSet<String>>,
}

impl MemoryCaseStore {
    pub fn new(cases: Vec<CaseRecord>) -> Self {
        Self {
            cases: Mutex::new(cases),
            ..Default::default()
        }
    }

    /// Mark record ids the store will reject during bulk updates
    pub async fn reject(&self, id: &str) {
        self.reject_ids.lock().await.insert(id.to_string());
    }

    pub async fn batches(&self) -> Vec<Vec<CaseUpdate>> {
        self.batches.lock().await.clone()
    }

    pub async fn applied_updates(&self) -> Vec<CaseUpdate> {
        self.batches.lock().await.iter().flatten().cloned().collect()
    }

    pub async fn case(&self, id: &str) -> Option<CaseRecord> {
        self.cases.lock().await.iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn query_submitted(&self, references: &[String]) -> Result<Vec<CaseRecord>> {
        Ok(self
            .cases
            .lock()
            .await
            .iter()
            .filter(|c| c.status == STATUS_SUBMITTED && references.contains(&c.reference))
            .cloned()
            .collect())
    }

    async fn bulk_update(&self, updates: &[CaseUpdate]) -> Result<usize> {
        let rejected = self.reject_ids.lock().await;
        let accepted: Vec<&CaseUpdate> = updates
            .iter()
            .filter(|u| !rejected.contains(&u.id))
            .collect();

        let mut cases = self.cases.lock().await;
        for update in &accepted {
            if let Some(case) = cases.iter_mut().find(|c| c.id == update.id) {
                case.status = update.status.clone();
            }
        }
        let count = accepted.len();
        self.batches.lock().await.push(updates.to_vec());
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Fixture builders

pub fn submitted_case(id: &str, reference: &str, postcode: Option<&str>) -> CaseRecord {
    CaseRecord {
        id: id.to_string(),
        reference: reference.to_string(),
        postcode: postcode.map(|p| p.to_string()),
        status: STATUS_SUBMITTED.to_string(),
    }
}

/// One data row in the authority layout: only the columns tests vary
pub struct SheetRow {
    pub reference: String,
    pub postcode: String,
    pub address_match: String,
    pub title_number: String,
    pub name_match: String,
}

impl SheetRow {
    pub fn matched(reference: &str, title_number: &str) -> Self {
        Self {
            reference: reference.to_string(),
            postcode: "AB1 2CD".to_string(),
            address_match: "Match".to_string(),
            title_number: title_number.to_string(),
            name_match: "Match".to_string(),
        }
    }
}

/// Build response spreadsheet bytes in the fixed 13-column layout
pub fn sheet_bytes(rows: &[SheetRow]) -> Vec<u8> {
    let header = [
        "CustomerRef",
        "Forename",
        "Surname",
        "CompanyNameSupplied",
        "InputAddress1",
        "InputAddress2",
        "InputAddress3",
        "InputAddress4",
        "InputAddress5",
        "InputPostcode",
        "AddressMatchResult",
        "TitleNumber",
        "NameMatchResult",
    ];

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, title) in header.iter().enumerate() {
        worksheet.write_string(0, col as u16, *title).unwrap();
    }
    for (index, row) in rows.iter().enumerate() {
        let r = (index + 1) as u32;
        worksheet.write_string(r, 0, &row.reference).unwrap();
        worksheet.write_string(r, 1, "Test").unwrap();
        worksheet.write_string(r, 2, "Landlord").unwrap();
        worksheet.write_string(r, 9, &row.postcode).unwrap();
        worksheet.write_string(r, 10, &row.address_match).unwrap();
        worksheet.write_string(r, 11, &row.title_number).unwrap();
        worksheet.write_string(r, 12, &row.name_match).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

/// Build zip archive bytes from (entry name, content) pairs
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }
    buffer.into_inner()
}

pub fn sheet_message(id: &str, received_at: DateTime<Utc>, bytes: Vec<u8>) -> MailMessage {
    authority_message(id, received_at, "results.xlsx", bytes)
}

pub fn archive_message(id: &str, received_at: DateTime<Utc>, bytes: Vec<u8>) -> MailMessage {
    authority_message(id, received_at, "title_deeds.zip", bytes)
}

fn authority_message(
    id: &str,
    received_at: DateTime<Utc>,
    attachment_name: &str,
    bytes: Vec<u8>,
) -> MailMessage {
    MailMessage {
        id: id.to_string(),
        subject: "Bulk verification results".to_string(),
        received_at,
        from_address: "bulk.results@landregistry.example".to_string(),
        attachments: vec![MailAttachment {
            name: attachment_name.to_string(),
            content_type: "application/octet-stream".to_string(),
            bytes,
        }],
    }
}
