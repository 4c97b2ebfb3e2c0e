//! Trigger endpoints
//!
//! `POST /poll` runs one inbox cycle immediately with the same logic as
//! the timer tick. `POST /reconcile` is the queued-handoff entry point: it
//! accepts a serialized pair descriptor and runs the identical
//! reconciliation path as direct dispatch.

use axum::{extract::State, routing::post, Json, Router};
use titlecheck_common::models::{PairDescriptor, ProcessingResult};

use crate::error::ApiResult;
use crate::services::CycleSummary;
use crate::AppState;

/// POST /poll - manual polling cycle
pub async fn trigger_poll(State(state): State<AppState>) -> ApiResult<Json<CycleSummary>> {
    let summary = state.watcher.run_cycle().await?;
    Ok(Json(summary))
}

/// POST /reconcile - process one declared pair
pub async fn trigger_reconcile(
    State(state): State<AppState>,
    Json(descriptor): Json<PairDescriptor>,
) -> ApiResult<Json<ProcessingResult>> {
    let result = state.reconciler.reconcile(&descriptor).await?;
    Ok(Json(result))
}

/// Build trigger routes
pub fn trigger_routes() -> Router<AppState> {
    Router::new()
        .route("/poll", post(trigger_poll))
        .route("/reconcile", post(trigger_reconcile))
}
