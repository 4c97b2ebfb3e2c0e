//! Mailbox provider interface
//!
//! The pipeline consumes the mailbox through this capability trait: list
//! unread authority messages with attachments, mark read, and file
//! processed messages into folders. The production implementation is
//! [`crate::clients::graph::GraphMailbox`]; tests substitute an in-memory
//! fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use titlecheck_common::Result;

/// One attachment on an inbox message
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One inbox message with its attachments
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Opaque provider-assigned identifier
    pub id: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub from_address: String,
    pub attachments: Vec<MailAttachment>,
}

/// Mailbox provider capability
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List unread messages whose sender is in `senders`
    async fn list_unread(&self, senders: &[String]) -> Result<Vec<MailMessage>>;

    /// Mark a message as read
    async fn mark_read(&self, message_id: &str) -> Result<()>;

    /// Look up a mail folder by display name
    async fn find_folder(&self, display_name: &str) -> Result<Option<String>>;

    /// Create a mail folder, returning its identifier
    async fn create_folder(&self, display_name: &str) -> Result<String>;

    /// Move a message into a folder
    async fn move_message(&self, message_id: &str, folder_id: &str) -> Result<()>;
}
