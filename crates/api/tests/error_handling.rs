//! Integration tests for callback verification, fulfillment settlement
//! rules, and the queue depth endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

use glowcast_core::coins::{CoinType, REASON_EARNED};
use glowcast_db::repositories::{FulfillmentRepo, LedgerRepo};
use glowcast_events::delivery::sign;

use common::{assert_error, body_json, get, send_json};

async fn seed(pool: &PgPool, user_id: i64, coins: i64) {
    LedgerRepo::credit(pool, user_id, coins, CoinType::Paid, REASON_EARNED, None)
        .await
        .unwrap();
}

/// Submit + approve a gift-card request and trigger a run, returning the
/// staged fulfillment id.
async fn staged_fulfillment(app: &axum::Router, pool: &PgPool) -> i64 {
    seed(pool, 1, 10_000).await;
    let created = send_json(
        app.clone(),
        "POST",
        "/api/v1/payouts",
        json!({
            "user_id": 1,
            "coins": 7_000,
            "method": "gift_card",
            "destination": "creator@example.com",
        }),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();
    send_json(
        app.clone(),
        "POST",
        &format!("/api/v1/payouts/{id}/approve"),
        json!({"operator_id": 99}),
    )
    .await;
    send_json(app.clone(), "POST", "/api/v1/payout-runs", json!({})).await;

    let staged = FulfillmentRepo::list_pending(pool).await.unwrap();
    staged[0].id
}

// ---------------------------------------------------------------------------
// Partner callbacks
// ---------------------------------------------------------------------------

async fn send_callback(
    app: axum::Router,
    body: &serde_json::Value,
    signature: &str,
) -> axum::http::Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/provider/callbacks")
            .header("content-type", "application/json")
            .header("x-provider-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn callback_with_bad_signature_is_rejected(pool: PgPool) {
    let (app, _) = common::build_test_app(pool).await;
    let body = json!({"provider_batch_id": "b-1", "items": []});

    let response = send_callback(app.clone(), &body, "deadbeef").await;
    assert_error(response, StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE").await;

    // Missing header is rejected the same way.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/provider/callbacks")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn callback_for_unknown_batch_is_a_bad_request(pool: PgPool) {
    let (app, _) = common::build_test_app(pool).await;
    let body = json!({"provider_batch_id": "never-heard-of-it", "items": []});
    // The secret matches `common::test_config`.
    let signature = sign("test-callback-secret", body.to_string().as_bytes());

    let response = send_callback(app, &body, &signature).await;
    assert_error(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}

// ---------------------------------------------------------------------------
// Fulfillments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn fulfillment_failure_without_reason_is_rejected(pool: PgPool) {
    let (app, _) = common::build_test_app(pool.clone()).await;
    let fulfillment_id = staged_fulfillment(&app, &pool).await;

    let response = send_json(
        app,
        "PATCH",
        &format!("/api/v1/fulfillments/{fulfillment_id}"),
        json!({"operator_id": 99, "status": "failed"}),
    )
    .await;
    assert_error(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fulfillment_completion_settles_the_request(pool: PgPool) {
    let (app, _) = common::build_test_app(pool.clone()).await;
    let fulfillment_id = staged_fulfillment(&app, &pool).await;

    let response = send_json(
        app.clone(),
        "PATCH",
        &format!("/api/v1/fulfillments/{fulfillment_id}"),
        json!({"operator_id": 99, "status": "completed", "code": "GC-XYZ-123"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["code"], "GC-XYZ-123");

    // A second decision on the same row conflicts.
    let again = send_json(
        app,
        "PATCH",
        &format!("/api/v1/fulfillments/{fulfillment_id}"),
        json!({"operator_id": 99, "status": "failed", "failure_reason": "oops"}),
    )
    .await;
    assert_error(again, StatusCode::CONFLICT, "STALE_STATE").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fulfillment_failure_refunds_the_user(pool: PgPool) {
    let (app, _) = common::build_test_app(pool.clone()).await;
    let fulfillment_id = staged_fulfillment(&app, &pool).await;

    let response = send_json(
        app,
        "PATCH",
        &format!("/api/v1/fulfillments/{fulfillment_id}"),
        json!({"operator_id": 99, "status": "failed", "failure_reason": "provider out of stock"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let balance = LedgerRepo::balance(&pool, 1).await.unwrap();
    assert_eq!(balance.paid_coins, 10_000, "failed fulfillment refunds the reservation");
}

// ---------------------------------------------------------------------------
// Queue depth
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn queue_depth_reports_buckets_with_version(pool: PgPool) {
    seed(&pool, 1, 20_000).await;
    let (app, _) = common::build_test_app(pool).await;

    send_json(
        app.clone(),
        "POST",
        "/api/v1/payouts",
        json!({
            "user_id": 1,
            "coins": 7_000,
            "method": "direct",
            "destination": "creator@example.com",
        }),
    )
    .await;

    let response = get(app, "/api/v1/queue/depth").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["pending"], 1);
    assert_eq!(json["data"]["approved"], 0);
    assert!(json["data"]["as_of_event_id"].is_number());
    assert!(json["data"]["refreshed_at"].is_string());
}
