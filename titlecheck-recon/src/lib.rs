//! titlecheck-recon library interface
//!
//! Reconciles asynchronous land-registry responses back into case records:
//! watches an inbox for the weekly results spreadsheet and title deeds
//! archive, pairs them by receipt time, parses both, extracts proprietor
//! names, and applies a batched partial-tolerant update to the case store.

pub mod api;
pub mod clients;
pub mod error;
pub mod paths;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::services::{InboxWatcher, Reconciler};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub watcher: Arc<InboxWatcher>,
    pub reconciler: Arc<Reconciler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(watcher: Arc<InboxWatcher>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            watcher,
            reconciler,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::trigger_routes())
        .with_state(state)
}
