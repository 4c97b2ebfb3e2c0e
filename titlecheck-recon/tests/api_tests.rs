//! HTTP trigger surface tests

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{TimeZone, Utc};
use helpers::*;
use http_body_util::BodyExt;
use std::sync::Arc;
use titlecheck_common::models::{MessageKind, PairDescriptor, PendingMessage};
use titlecheck_recon::clients::{CaseStore, Mailbox, ObjectStore};
use titlecheck_recon::services::{InboxWatcher, Reconciler};
use titlecheck_recon::{build_router, AppState};
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let settings = test_settings();
    let mailbox: Arc<dyn Mailbox> = Arc::new(MemoryMailbox::new(vec![]));
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let cases: Arc<dyn CaseStore> = Arc::new(MemoryCaseStore::new(vec![]));

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        cases,
        mailbox.clone(),
        settings.clone(),
    ));
    let watcher = Arc::new(InboxWatcher::new(
        mailbox,
        store,
        reconciler.clone(),
        settings,
    ));
    build_router(AppState::new(watcher, reconciler))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "titlecheck-recon");
}

#[tokio::test]
async fn manual_poll_runs_an_empty_cycle() {
    let response = test_app()
        .oneshot(Request::post("/poll").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ingested"], 0);
    assert_eq!(json["pairs_processed"], 0);
}

#[tokio::test]
async fn reconcile_for_an_unknown_pair_conflicts() {
    let received = Utc.with_ymd_and_hms(2026, 8, 21, 8, 0, 0).unwrap();
    let message = |id: &str, kind: MessageKind, name: &str| PendingMessage {
        message_id: id.to_string(),
        subject: "Bulk verification results".to_string(),
        received_at: received,
        from_address: "bulk.results@landregistry.example".to_string(),
        kind,
        attachment_name: name.to_string(),
        attachment_path: titlecheck_recon::paths::attachment_path(id, name),
    };
    let descriptor = PairDescriptor::new(
        message("s1", MessageKind::ResultsSpreadsheet, "results.xlsx"),
        message("z1", MessageKind::DocumentsArchive, "title_deeds.zip"),
    );

    let response = test_app()
        .oneshot(
            Request::post("/reconcile")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&descriptor).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "ALREADY_PROCESSED");
}
