use std::sync::Arc;

use axum::{body::Body, http::Request, http::StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use wl_common::escrow::store::{
    EscrowStatus, EscrowTransaction, Milestone, MilestoneStatus,
};
use wl_common::escrow::MemoryStore;

const CLIENT_ID: i64 = 1;
const FREELANCER_ID: i64 = 2;
const MILESTONE_ID: i64 = 100;
const TRANSACTION_ID: i64 = 700;

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_milestone(Milestone {
        id: MILESTONE_ID,
        contract_id: 55,
        amount_cents: 50_000,
        status: MilestoneStatus::Pending,
        transaction_id: Some(TRANSACTION_ID),
    });
    store.insert_transaction(EscrowTransaction {
        id: TRANSACTION_ID,
        contract_id: 55,
        milestone_id: Some(MILESTONE_ID),
        client_id: CLIENT_ID,
        freelancer_id: FREELANCER_ID,
        gateway_ref: "hold-700".into(),
        status: EscrowStatus::Held,
        held_at: Utc::now(),
        released_at: None,
    });
    store
}

fn post(uri: &str, acting_user: Option<i64>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-api-key", "test-key")
        .header("content-type", "application/json");
    if let Some(user_id) = acting_user {
        builder = builder.header("x-acting-user", user_id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn deliver_then_release_moves_the_milestone_through_its_lifecycle() {
    let store = seeded_store();
    let state = wl_api::test_state_with_store(store.clone(), "test-key");
    let app = wl_api::create_router(state);

    let deliver = app
        .clone()
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/deliver"),
            Some(FREELANCER_ID),
            r#"{"file_ref":"s3://deliverables/v1.zip"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(deliver.status(), StatusCode::OK);
    assert_eq!(
        store.milestone(MILESTONE_ID).unwrap().status,
        MilestoneStatus::Review
    );

    let release = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/release"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(release.status(), StatusCode::OK);

    let bytes = release.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["release_amount_cents"], 50_000);
    assert_eq!(body["transaction_id"], TRANSACTION_ID);

    let transaction = store.stored_transaction(TRANSACTION_ID).unwrap();
    assert_eq!(transaction.status, EscrowStatus::Released);
    assert_eq!(
        store.milestone(MILESTONE_ID).unwrap().status,
        MilestoneStatus::Approved
    );
}

#[tokio::test]
async fn deliver_without_an_acting_user_is_forbidden() {
    let state = wl_api::test_state_with_store(seeded_store(), "test-key");
    let app = wl_api::create_router(state);

    let response = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/deliver"),
            None,
            r#"{"file_ref":"s3://deliverables/v1.zip"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn second_release_conflicts() {
    let state = wl_api::test_state_with_store(seeded_store(), "test-key");
    let app = wl_api::create_router(state);

    let first = app
        .clone()
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/release"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/release"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn refund_after_release_conflicts() {
    let store = seeded_store();
    let state = wl_api::test_state_with_store(store.clone(), "test-key");
    let app = wl_api::create_router(state);

    let release = app
        .clone()
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/release"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(release.status(), StatusCode::OK);

    let refund = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/refund"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(refund.status(), StatusCode::CONFLICT);

    assert_eq!(
        store.stored_transaction(TRANSACTION_ID).unwrap().status,
        EscrowStatus::Released
    );
}

#[tokio::test]
async fn refund_by_the_client_disputes_the_milestone() {
    let store = seeded_store();
    let state = wl_api::test_state_with_store(store.clone(), "test-key");
    let app = wl_api::create_router(state);

    let response = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/refund"),
            Some(CLIENT_ID),
            "{}",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["refund_amount_cents"], 50_000);

    assert_eq!(
        store.stored_transaction(TRANSACTION_ID).unwrap().status,
        EscrowStatus::Refunded
    );
    assert_eq!(
        store.milestone(MILESTONE_ID).unwrap().status,
        MilestoneStatus::Disputed
    );

    let actions: Vec<&str> = store
        .audit_entries()
        .iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions, vec!["milestone_refunded"]);
}

#[tokio::test]
async fn release_by_the_freelancer_is_forbidden() {
    let state = wl_api::test_state_with_store(seeded_store(), "test-key");
    let app = wl_api::create_router(state);

    let response = app
        .oneshot(post(
            &format!("/api/milestones/{MILESTONE_ID}/release"),
            Some(FREELANCER_ID),
            "{}",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
