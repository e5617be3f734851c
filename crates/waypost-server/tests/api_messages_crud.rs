//! Integration tests for the message creation, query, and deletion
//! endpoints, driven through the full router.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;
use waypost_bus::EventBus;
use waypost_server::middleware::RateLimiter;
use waypost_server::{app, AppState};

/// Builds a router over a fresh file-backed database. The creation
/// limit is raised so CRUD tests are not throttled.
fn test_app(create_limit: u32) -> Router {
    let db_file = tempfile::NamedTempFile::new().unwrap();
    let db_path = db_file.path().to_str().unwrap().to_string();
    // Leak the tempfile so it persists for the duration of the test.
    std::mem::forget(db_file);

    let pool = waypost_db::create_pool(&db_path, waypost_db::DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        waypost_db::run_migrations(&conn).unwrap();
    }

    app(AppState {
        pool,
        bus: EventBus::new(),
        rate_limiter: RateLimiter::new(),
        create_limit,
    })
}

/// Client address injected for the rate-limit middleware, which reads
/// `ConnectInfo` from request extensions.
fn client_addr() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
}

fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/messages")
        .header("content-type", "application/json")
        .extension(client_addr())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .extension(client_addr())
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .extension(client_addr())
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn full_message_lifecycle() {
    let app = test_app(100);

    // Create
    let response = app
        .clone()
        .oneshot(post_json(&json!({
            "content": [1, 2, 3],
            "worldID": 10,
            "teri": 1,
            "x": 0, "y": 0, "z": 0
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let created = body_json(response).await;
    assert_eq!(created["content"], json!([1, 2, 3]));
    assert_eq!(created["worldID"], 10);
    let delete_key = created["deleteKey"].as_str().expect("deleteKey present");
    assert_eq!(delete_key.len(), 64);
    let id = created["id"].as_i64().expect("id present");

    // Query: exactly the created message, without the delete key
    let response = app
        .clone()
        .oneshot(get("/messages?teri=1&filter=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let listed = listed.as_array().expect("array response");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], id);
    assert_eq!(listed[0]["content"], json!([1, 2, 3]));
    assert!(listed[0].get("deleteKey").is_none());
    assert!(listed[0].get("delete_key").is_none());

    // Delete with the wrong key: unauthorized, message intact
    let response = app
        .clone()
        .oneshot(delete(&format!("/messages/{id}?deleteKey=wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get("/messages?teri=1&filter=10"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    // Delete with the correct key
    let response = app
        .clone()
        .oneshot(delete(&format!("/messages/{id}?deleteKey={delete_key}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Query is now empty
    let response = app
        .clone()
        .oneshot(get("/messages?teri=1&filter=10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_content_round_trips() {
    let app = test_app(100);

    let response = app
        .clone()
        .oneshot(post_json(&json!({
            "content": [],
            "worldID": 4,
            "teri": 2,
            "x": 1.5, "y": -2.5, "z": 0
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert_eq!(created["content"], json!([]));

    let response = app
        .clone()
        .oneshot(get("/messages?teri=2&filter=4"))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed[0]["content"], json!([]));
    assert_eq!(listed[0]["x"], 1.5);
    assert_eq!(listed[0]["y"], -2.5);
}

#[tokio::test]
async fn create_rejects_invalid_payloads() {
    let app = test_app(100);

    let bad_payloads = [
        json!({}),
        json!({"content": [1], "worldID": -1, "teri": 1, "x": 0, "y": 0, "z": 0}),
        json!({"content": [1], "worldID": 1.5, "teri": 1, "x": 0, "y": 0, "z": 0}),
        json!({"content": "text", "worldID": 1, "teri": 1, "x": 0, "y": 0, "z": 0}),
        json!({"content": [-1], "worldID": 1, "teri": 1, "x": 0, "y": 0, "z": 0}),
        json!({"content": [1], "worldID": 1, "x": 0, "y": 0, "z": 0}),
        json!({"content": [1], "worldID": 1, "teri": 1, "x": "a", "y": 0, "z": 0}),
        json!({"content": [1], "worldID": 1, "teri": 1, "x": 0, "y": 0}),
    ];

    for payload in &bad_payloads {
        let response = app.clone().oneshot(post_json(payload)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload should be rejected: {payload}"
        );
    }

    // Invalid payloads are never persisted
    let response = app
        .clone()
        .oneshot(get("/messages?teri=1&filter=1"))
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_non_json_body() {
    let app = test_app(100);

    let request = Request::builder()
        .method("POST")
        .uri("/messages")
        .header("content-type", "application/json")
        .extension(client_addr())
        .body(Body::from("this is not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_rejects_malformed_parameters() {
    let app = test_app(100);

    for uri in [
        "/messages",
        "/messages?teri=1",
        "/messages?filter=1",
        "/messages?teri=abc&filter=1",
        "/messages?teri=-1&filter=1",
        "/messages?teri=1.5&filter=1",
        "/messages?teri=1&filter=",
        "/messages?teri=1&filter=1,x",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "query should be rejected: {uri}"
        );
    }
}

#[tokio::test]
async fn query_filters_by_teri_and_world_set() {
    let app = test_app(100);

    for (world_id, teri) in [(10, 1), (11, 1), (10, 2)] {
        let response = app
            .clone()
            .oneshot(post_json(&json!({
                "content": [world_id, teri],
                "worldID": world_id,
                "teri": teri,
                "x": 0, "y": 0, "z": 0
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get("/messages?teri=1&filter=10,11"))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get("/messages?teri=2&filter=10,11"))
        .await
        .unwrap();
    let listed = body_json(response).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["worldID"], 10);
}

#[tokio::test]
async fn delete_unknown_id_is_bad_request() {
    let app = test_app(100);

    // Unknown numeric id: folded into 400, not 404
    let response = app
        .clone()
        .oneshot(delete("/messages/999?deleteKey=whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Non-numeric id: same classification
    let response = app
        .clone()
        .oneshot(delete("/messages/abc?deleteKey=whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_without_key_is_unauthorized() {
    let app = test_app(100);

    let response = app
        .clone()
        .oneshot(post_json(&json!({
            "content": [7],
            "worldID": 1,
            "teri": 1,
            "x": 0, "y": 0, "z": 0
        })))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(delete(&format!("/messages/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
