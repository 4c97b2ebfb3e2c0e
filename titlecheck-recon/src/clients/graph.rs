//! Graph-style REST mailbox client
//!
//! Production [`Mailbox`] implementation against a Microsoft-Graph-shaped
//! mail API: OData filters for the unread listing, base64 attachment
//! content, folder lookup by display name, and message move by destination
//! folder id.

use crate::clients::mailbox::{MailAttachment, MailMessage, Mailbox};
use crate::clients::session::Session;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use titlecheck_common::{Error, Result};

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    subject: Option<String>,
    received_date_time: DateTime<Utc>,
    from: Option<GraphFrom>,
    #[serde(default)]
    attachments: Vec<GraphAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFrom {
    email_address: GraphEmailAddress,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphAttachment {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    content_bytes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFolder {
    id: String,
}

/// Mailbox provider backed by a Graph-style REST API
pub struct GraphMailbox {
    http: reqwest::Client,
    session: Arc<Session>,
    /// e.g. `https://graph.example.com/v1.0/users/{mailbox}`
    base_url: String,
}

impl GraphMailbox {
    pub fn new(http: reqwest::Client, session: Arc<Session>, base_url: String) -> Self {
        Self {
            http,
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn sender_filter(senders: &[String]) -> String {
        let clauses: Vec<String> = senders
            .iter()
            .map(|s| format!("from/emailAddress/address eq '{}'", s.replace('\'', "''")))
            .collect();
        format!("isRead eq false and ({})", clauses.join(" or "))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.session.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Mailbox(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Mailbox for GraphMailbox {
    async fn list_unread(&self, senders: &[String]) -> Result<Vec<MailMessage>> {
        let url = format!("{}/mailFolders/inbox/messages", self.base_url);
        let filter = Self::sender_filter(senders);
        let listing: ListResponse<GraphMessage> = self
            .get_json(&url, &[("$filter", filter.as_str()), ("$expand", "attachments")])
            .await?;

        let mut messages = Vec::with_capacity(listing.value.len());
        for msg in listing.value {
            let attachments = msg
                .attachments
                .into_iter()
                .filter_map(|a| {
                    let encoded = a.content_bytes?;
                    match base64::engine::general_purpose::STANDARD.decode(&encoded) {
                        Ok(bytes) => Some(MailAttachment {
                            name: a.name,
                            content_type: a.content_type.unwrap_or_default(),
                            bytes,
                        }),
                        Err(e) => {
                            tracing::warn!(attachment = %a.name, "Undecodable attachment content: {}", e);
                            None
                        }
                    }
                })
                .collect();

            messages.push(MailMessage {
                id: msg.id,
                subject: msg.subject.unwrap_or_default(),
                received_at: msg.received_date_time,
                from_address: msg
                    .from
                    .map(|f| f.email_address.address)
                    .unwrap_or_default(),
                attachments,
            });
        }
        Ok(messages)
    }

    async fn mark_read(&self, message_id: &str) -> Result<()> {
        let url = format!("{}/messages/{}", self.base_url, message_id);
        let token = self.session.bearer().await?;
        let response = self
            .http
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "isRead": true }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Mailbox(format!(
                "mark_read {} returned {}",
                message_id,
                response.status()
            )));
        }
        Ok(())
    }

    async fn find_folder(&self, display_name: &str) -> Result<Option<String>> {
        let url = format!("{}/mailFolders", self.base_url);
        let filter = format!("displayName eq '{}'", display_name.replace('\'', "''"));
        let listing: ListResponse<GraphFolder> =
            self.get_json(&url, &[("$filter", filter.as_str())]).await?;
        Ok(listing.value.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, display_name: &str) -> Result<String> {
        let url = format!("{}/mailFolders", self.base_url);
        let token = self.session.bearer().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "displayName": display_name }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Mailbox(format!(
                "create_folder '{}' returned {}",
                display_name,
                response.status()
            )));
        }
        let folder: GraphFolder = response.json().await?;
        Ok(folder.id)
    }

    async fn move_message(&self, message_id: &str, folder_id: &str) -> Result<()> {
        let url = format!("{}/messages/{}/move", self.base_url, message_id);
        let token = self.session.bearer().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "destinationId": folder_id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Mailbox(format!(
                "move {} returned {}",
                message_id,
                response.status()
            )));
        }
        Ok(())
    }
}
