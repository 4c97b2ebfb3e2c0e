//! Case-record store interface and Web API implementation
//!
//! The store holds one compliance check per landlord/property. The
//! reconciler only ever queries open (Submitted) cases by reference key and
//! applies bulk field updates; it never creates or deletes records.

use crate::clients::session::Session;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use titlecheck_common::models::{CaseRecord, CaseUpdate, STATUS_SUBMITTED};
use titlecheck_common::{Error, Result};

/// Case-record store capability
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// All cases whose reference key is in `references` and whose status is
    /// still Submitted (awaiting an authority response)
    async fn query_submitted(&self, references: &[String]) -> Result<Vec<CaseRecord>>;

    /// Apply one batch of updates (at most the store's per-request limit).
    /// Partial-tolerant: a rejected record does not fail the batch. Returns
    /// the number of records the store accepted.
    async fn bulk_update(&self, updates: &[CaseUpdate]) -> Result<usize>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    value: Vec<WireCase>,
}

#[derive(Debug, Deserialize)]
struct WireCase {
    id: String,
    reference: String,
    postcode: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    accepted: usize,
}

/// Case store backed by an OData-style Web API
pub struct WebApiCaseStore {
    http: reqwest::Client,
    session: Arc<Session>,
    base_url: String,
}

impl WebApiCaseStore {
    pub fn new(http: reqwest::Client, session: Arc<Session>, base_url: String) -> Self {
        Self {
            http,
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn query_filter(references: &[String]) -> String {
        let refs: Vec<String> = references
            .iter()
            .map(|r| format!("'{}'", r.replace('\'', "''")))
            .collect();
        format!(
            "reference in ({}) and status eq '{}'",
            refs.join(","),
            STATUS_SUBMITTED
        )
    }
}

#[async_trait]
impl CaseStore for WebApiCaseStore {
    async fn query_submitted(&self, references: &[String]) -> Result<Vec<CaseRecord>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/cases", self.base_url);
        let filter = Self::query_filter(references);
        let token = self.session.bearer().await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("$filter", filter.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "case query returned {}",
                response.status()
            )));
        }
        let listing: QueryResponse = response.json().await?;
        Ok(listing
            .value
            .into_iter()
            .map(|c| CaseRecord {
                id: c.id,
                reference: c.reference,
                postcode: c.postcode,
                status: c.status,
            })
            .collect())
    }

    async fn bulk_update(&self, updates: &[CaseUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/cases/$batch", self.base_url);
        let body: Vec<serde_json::Value> = updates
            .iter()
            .map(|u| {
                json!({
                    "id": u.id,
                    "fields": {
                        "status": u.status,
                        "matchType": u.match_type,
                        "titleNumber": u.title_number,
                        "titleDocumentUrl": u.title_url,
                        "proprietorName": u.proprietor_name,
                        "responseReceived": u.response_received,
                    }
                })
            })
            .collect();

        let token = self.session.bearer().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "updates": body }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "bulk update returned {}",
                response.status()
            )));
        }
        let batch: BatchResponse = response.json().await?;
        Ok(batch.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_filter_includes_all_refs_and_submitted_status() {
        let filter = WebApiCaseStore::query_filter(&[
            "REF001".to_string(),
            "REF002".to_string(),
        ]);
        assert_eq!(
            filter,
            "reference in ('REF001','REF002') and status eq 'Submitted'"
        );
    }

    #[test]
    fn query_filter_escapes_quotes() {
        let filter = WebApiCaseStore::query_filter(&["O'REF".to_string()]);
        assert!(filter.contains("'O''REF'"));
    }
}
