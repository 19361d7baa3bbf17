//! Integration tests for the HTTP surface.
//!
//! Drives the full middleware stack from `build_app` with the real Stripe
//! adapter doing webhook signature checks. Only webhook paths that need no
//! Stripe API round-trip are exercised.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use entitlement_engine::adapters::http::{build_app, EntitlementAppState};
use entitlement_engine::adapters::stripe::sign_payload;
use entitlement_engine::adapters::{
    InMemoryEntitlementStore, StripeConfig, StripePaymentAdapter, SystemClock,
};
use entitlement_engine::domain::entitlement::{EntitlementPatch, EntitlementPolicy, Plan};
use entitlement_engine::domain::foundation::{AccountId, Timestamp};
use entitlement_engine::ports::EntitlementStore;

const WEBHOOK_SECRET: &str = "whsec_integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

fn app(store: &InMemoryEntitlementStore) -> Router {
    let stripe = StripePaymentAdapter::new(StripeConfig::new(
        "sk_test_integration",
        WEBHOOK_SECRET,
        "price_monthly",
    ));
    let state = EntitlementAppState::new(
        Arc::new(store.clone()),
        Arc::new(stripe),
        Arc::new(SystemClock),
        EntitlementPolicy::default(),
        Duration::from_secs(5),
    );
    build_app(state, Duration::from_secs(10))
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, read_json(response).await)
}

fn as_account(method: &str, uri: &str, account: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Account-Id", account)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn subscription_deleted_payload(customer_id: &str, subscription_id: &str) -> String {
    json!({
        "id": "evt_integration_deleted",
        "object": "event",
        "type": "customer.subscription.deleted",
        "created": chrono::Utc::now().timestamp(),
        "livemode": false,
        "data": {
            "object": {
                "id": subscription_id,
                "customer": customer_id,
                "status": "canceled"
            }
        }
    })
    .to_string()
}

fn webhook(payload: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", signature)
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn seed_active(store: &InMemoryEntitlementStore, app: &Router, id: &str) {
    let (status, _) = call(app, as_account("POST", "/api/entitlements", id, json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);

    store
        .update(
            &AccountId::new(id).unwrap(),
            &EntitlementPatch::new()
                .with_plan(Plan::Active)
                .with_customer_id("cus_int")
                .with_subscription_id("sub_int")
                .with_subscription_status("active")
                .with_verified_at(Timestamp::now()),
        )
        .await
        .unwrap();
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn signed_cancellation_webhook_revokes_access() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);
    seed_active(&store, &app, "acct-int").await;

    let (_, access) = call(
        &app,
        as_account("GET", "/api/entitlements/access", "acct-int", Value::Null),
    )
    .await;
    assert_eq!(access["entitled"], true);

    let payload = subscription_deleted_payload("cus_int", "sub_int");
    let signature =
        sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), payload.as_bytes()).unwrap();
    let (status, ack) = call(&app, webhook(&payload, &signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["received"], true);
    assert_eq!(ack["event_id"], "evt_integration_deleted");
    assert_eq!(ack["outcome"], "applied");

    let (_, snapshot) = call(
        &app,
        as_account("GET", "/api/entitlements", "acct-int", Value::Null),
    )
    .await;
    assert_eq!(snapshot["plan"], "inactive");
    assert_eq!(snapshot["entitled"], false);
    assert_eq!(snapshot["provider_subscription_status"], "canceled");
}

#[tokio::test]
async fn tampered_webhook_is_rejected_without_writing() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);
    seed_active(&store, &app, "acct-int").await;
    let before = store
        .get(&AccountId::new("acct-int").unwrap())
        .await
        .unwrap();

    let payload = subscription_deleted_payload("cus_int", "sub_int");
    let signature = sign_payload(
        "whsec_attacker",
        chrono::Utc::now().timestamp(),
        payload.as_bytes(),
    )
    .unwrap();
    let (status, body) = call(&app, webhook(&payload, &signature)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "INVALID_WEBHOOK_SIGNATURE");
    let after = store
        .get(&AccountId::new("acct-int").unwrap())
        .await
        .unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn replayed_webhook_outside_tolerance_is_rejected() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);

    let payload = subscription_deleted_payload("cus_int", "sub_int");
    let stale = chrono::Utc::now().timestamp() - 3600;
    let signature = sign_payload(WEBHOOK_SECRET, stale, payload.as_bytes()).unwrap();
    let (status, _) = call(&app, webhook(&payload, &signature)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_for_unknown_customer_is_acknowledged() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);

    let payload = subscription_deleted_payload("cus_nobody", "sub_nobody");
    let signature =
        sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), payload.as_bytes()).unwrap();
    let (status, ack) = call(&app, webhook(&payload, &signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "ignored");
}

#[tokio::test]
async fn malformed_signed_payload_is_a_client_error() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);

    let payload = "not json";
    let signature =
        sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), payload.as_bytes()).unwrap();
    let (status, _) = call(&app, webhook(payload, &signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let store = InMemoryEntitlementStore::new();
    let app = app(&store);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
