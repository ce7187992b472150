//! Shared helpers for API integration tests.
//!
//! Mirrors the router construction in `main.rs` so tests exercise the same
//! middleware stack (CORS, request ID, timeout, tracing, panic recovery)
//! that production uses, with the payout partner swapped for the mock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use sqlx::PgPool;
use tower::ServiceExt;

use glowcast_api::config::ServerConfig;
use glowcast_api::router::build_app_router;
use glowcast_api::state::AppState;
use glowcast_core::cache::SnapshotCell;
use glowcast_db::repositories::ThresholdRepo;
use glowcast_engine::EngineContext;
use glowcast_events::EventBus;
use glowcast_provider::MockProvider;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        provider_base_url: "http://localhost:9400".to_string(),
        provider_api_key: "test-key".to_string(),
        provider_webhook_secret: "test-callback-secret".to_string(),
        alert_webhook_url: "http://localhost:9500/alerts".to_string(),
        alert_webhook_secret: "test-alert-secret".to_string(),
        gift_card_provider: "tango".to_string(),
    }
}

/// Build the full application router over the given pool, returning the
/// mock partner so tests can script outcomes.
pub async fn build_test_app(pool: PgPool) -> (Router, Arc<MockProvider>) {
    let config = test_config();
    let provider = Arc::new(MockProvider::new());
    let thresholds = ThresholdRepo::detect(&pool).await.unwrap();
    let event_bus = Arc::new(EventBus::default());

    let engine = EngineContext::new(
        pool.clone(),
        Arc::clone(&provider) as Arc<dyn glowcast_provider::PayoutProvider>,
        thresholds,
        Arc::clone(&event_bus),
        config.gift_card_provider.clone(),
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        event_bus,
        queue_depth: Arc::new(SnapshotCell::new()),
    };

    (build_app_router(state, &config), provider)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, path: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a JSON request with the given method and body.
pub async fn send_json(
    app: Router,
    method: &str,
    path: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Parse a response body as a UTF-8 string.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Assert an error envelope shape: `{ "error": ..., "code": <code> }`.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code, "unexpected error code: {json}");
    assert!(json["error"].is_string());
}
