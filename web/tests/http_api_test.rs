//! HTTP API tests driven through the router with `oneshot`.
//!
//! Run with: `cargo test -p booking-web --test http_api_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use booking_testing::{EngineFixture, ScriptedCharge, ScriptedPaymentGate};
use booking_web::{build_router, AppState, CORRELATION_ID_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(fx: &EngineFixture) -> Router {
    build_router(AppState::new(fx.engine.clone()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let response = send(app, Method::POST, uri, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

/// Health answers and every response carries a correlation id.
#[tokio::test]
async fn health_check_carries_correlation_id() {
    let fx = EngineFixture::new();
    let response = send(&app(&fx), Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
}

/// Register, book, waitlist, cancel and confirm entirely over HTTP.
#[tokio::test]
async fn booking_lifecycle_over_http() {
    let fx = EngineFixture::new();
    let app = app(&fx);

    let offering = create(&app, "/api/offerings", json!({"name": "Robotics", "capacity": 1, "group": "Tuesday B"})).await;
    let offering_id = offering["id"].as_str().unwrap().to_string();
    let ada = create(&app, "/api/subjects", json!({"name": "Ada"})).await;
    let grace = create(&app, "/api/subjects", json!({"name": "Grace"})).await;

    let response = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({"offering": offering_id, "subject": ada["id"], "idempotency_key": "ada-1"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = json_body(response).await;
    assert_eq!(first["status"], "confirmed");
    assert_eq!(first["allocated_group"], "Tuesday B");

    let second = json_body(
        send(
            &app,
            Method::POST,
            "/api/bookings",
            Some(json!({"offering": offering_id, "subject": grace["id"], "idempotency_key": "grace-1"})),
        )
        .await,
    )
    .await;
    assert_eq!(second["status"], "waitlisted");
    assert_eq!(second["waitlist_position"], 1);
    let second_id = second["booking_id"].as_str().unwrap().to_string();

    let position = json_body(
        send(&app, Method::GET, &format!("/api/bookings/{second_id}/waitlist-position"), None).await,
    )
    .await;
    assert_eq!(position["position"], 1);
    assert_eq!(position["queue_length"], 1);

    let first_id = first["booking_id"].as_str().unwrap();
    let response = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{first_id}/cancel"),
        Some(json!({"reason": "moved away"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = json_body(response).await;
    assert_eq!(cancelled["ok"], true);
    assert_eq!(cancelled["booking"]["status"], "cancelled");
    assert_eq!(cancelled["promoted_waitlist_booking"]["status"], "offered");

    let confirmed = json_body(
        send(&app, Method::POST, &format!("/api/bookings/{second_id}/confirm"), None).await,
    )
    .await;
    assert_eq!(confirmed["status"], "confirmed");

    let snapshot = json_body(
        send(&app, Method::GET, &format!("/api/offerings/{offering_id}"), None).await,
    )
    .await;
    assert_eq!(snapshot["confirmed"], 1);
    assert_eq!(snapshot["available"], 0);
}

/// Domain errors come back as structured JSON with the mapped status.
#[tokio::test]
async fn errors_are_structured() {
    let fx = EngineFixture::new();
    let app = app(&fx);
    let offering = fx.offering("Chess", 2).unwrap();
    let [ada] = fx.subjects().unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/api/bookings/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["retryable"], false);

    let request = json!({"offering": offering, "subject": ada, "idempotency_key": "k"});
    send(&app, Method::POST, "/api/bookings", Some(request)).await;
    let response = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({"offering": offering, "subject": ada, "idempotency_key": "k", "payer": "someone else"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "idempotency_conflict");

    let response = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({"offering": offering, "idempotency_key": "no-subject"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["code"], "validation");
}

/// Payment failures map to 402 (declined) and 503 (retryable outage).
#[tokio::test]
async fn payment_failures_map_to_statuses() {
    let fx = EngineFixture::with_gate(ScriptedPaymentGate::scripted([
        ScriptedCharge::Decline("card expired".to_string()),
        ScriptedCharge::Timeout,
    ]));
    let app = app(&fx);
    let offering = fx.paid_offering("Sailing", 2, 4_500).unwrap();
    let [ada] = fx.subjects().unwrap();
    let request = json!({"offering": offering, "subject": ada, "idempotency_key": "sail-1"});

    let response = send(&app, Method::POST, "/api/bookings", Some(request.clone())).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json_body(response).await["code"], "payment_declined");

    let response = send(&app, Method::POST, "/api/bookings", Some(request.clone())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["retryable"], true);

    let response = send(&app, Method::POST, "/api/bookings", Some(request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["payment_reference"], "test-obl-0003");
}

/// Batch rows are reported individually; capacity changes promote the queue.
#[tokio::test]
async fn batch_and_capacity_endpoints() {
    let fx = EngineFixture::new();
    let app = app(&fx);
    let offering = fx.offering("Football", 2).unwrap();
    let [a, b, c] = fx.subjects().unwrap();

    let response = send(
        &app,
        Method::POST,
        &format!("/api/offerings/{offering}/batch"),
        Some(json!({
            "request_surface": "import",
            "rows": [
                {"subject": a, "idempotency_key": "row-a"},
                {"subject": b, "idempotency_key": "row-b"},
                {"subject": c, "idempotency_key": "row-c"}
            ]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;
    assert_eq!(outcome["ok"], true);
    assert_eq!(outcome["success_count"], 3);
    assert_eq!(outcome["results"][2]["booking"]["status"], "waitlisted");

    let response = send(
        &app,
        Method::PUT,
        &format!("/api/offerings/{offering}/capacity"),
        Some(json!({"capacity": 1})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let snapshot = json_body(
        send(
            &app,
            Method::PUT,
            &format!("/api/offerings/{offering}/capacity"),
            Some(json!({"capacity": 3})),
        )
        .await,
    )
    .await;
    assert_eq!(snapshot["capacity"], 3);
    assert_eq!(snapshot["open_offers"], 1);
    assert_eq!(snapshot["waitlist_length"], 0);

    let closed = json_body(
        send(
            &app,
            Method::PUT,
            &format!("/api/offerings/{offering}/accepting"),
            Some(json!({"accepting": false})),
        )
        .await,
    )
    .await;
    assert_eq!(closed["accepting"], false);
}

/// Declining over HTTP re-queues the booking.
#[tokio::test]
async fn decline_endpoint() {
    let fx = EngineFixture::new();
    let app = app(&fx);
    let offering = fx.offering("Drama", 1).unwrap();
    let [a, b, c] = fx.subjects().unwrap();
    let first = fx.submit(offering, a, "d-a").await.unwrap();
    let second = fx.submit(offering, b, "d-b").await.unwrap();
    fx.submit(offering, c, "d-c").await.unwrap();
    fx.engine.cancel(first.booking_id, None).await.unwrap();

    let response = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{}/decline", second.booking_id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let declined = json_body(response).await;
    assert_eq!(declined["status"], "waitlisted");
    assert_eq!(declined["waitlist_position"], 1);

    let response = send(
        &app,
        Method::POST,
        &format!("/api/bookings/{}/confirm", second.booking_id),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::GONE);
}

/// Without an installed recorder the metrics endpoint is unavailable.
#[tokio::test]
async fn metrics_requires_recorder() {
    let fx = EngineFixture::new();
    let response = send(&app(&fx), Method::GET, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let handle = booking_runtime::metrics::detached_handle().unwrap();
    let app = build_router(AppState::new(fx.engine.clone()).with_metrics(handle));
    let response = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
