use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use canopy::authz::graph::MemoryGraph;
use canopy::authz::Authz;
use canopy::settings::Settings;
use canopy::web::app;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Router {
    app(&Settings::default(), Authz::new(Arc::new(MemoryGraph::new())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

#[tokio::test]
async fn test_healthz() {
    let app = test_app();
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_provision_grant_and_check() {
    let app = test_app();

    let (status, alice) = post(&app, "/v1/accounts", json!({ "name": "alice" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alice["kind"], "account");
    let alice = alice["id"].as_str().unwrap().to_string();

    let (status, ns) = post(&app, "/v1/namespaces", json!({ "name": "acme" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let ns = ns["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, "GET", "/v1/namespaces/acme", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, json!({ "id": ns, "name": "acme" }));

    let (_, site) = post(&app, "/v1/objects", json!({ "name": "site", "parent": ns })).await;
    let site = site["id"].as_str().unwrap().to_string();
    let (status, rack) = post(&app, "/v1/objects", json!({ "name": "rack", "parent": site })).await;
    assert_eq!(status, StatusCode::CREATED);
    let rack = rack["id"].as_str().unwrap().to_string();

    let check = |resource: &str, action: &str| {
        json!({ "subject": alice, "resource": resource, "action": action })
    };

    let (status, body) = post(&app, "/v1/check", check(&rack, "READ")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": false }));

    let (status, record) = post(
        &app,
        "/v1/grants/object",
        json!({ "subject": alice, "resource": site, "action": "WRITE", "inherit": true }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["permission"], "WRITE");
    assert_eq!(record["inherit"], true);

    let (_, body) = post(&app, "/v1/check", check(&rack, "WRITE")).await;
    assert_eq!(body, json!({ "allowed": true }));
    let (_, body) = post(&app, "/v1/check", check(&ns, "READ")).await;
    assert_eq!(body, json!({ "allowed": false }));

    let (status, _) = post(
        &app,
        "/v1/grants/namespace",
        json!({ "subject": alice, "namespace": ns, "action": "READ" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = post(&app, "/v1/check", check(&ns, "READ")).await;
    assert_eq!(body, json!({ "allowed": true }));
}

#[tokio::test]
async fn test_object_grant_inherit_defaults_to_false() {
    let app = test_app();
    let (_, alice) = post(&app, "/v1/accounts", json!({ "name": "alice" })).await;
    let (_, ns) = post(&app, "/v1/namespaces", json!({ "name": "acme" })).await;
    let (_, site) = post(&app, "/v1/objects", json!({ "name": "site", "parent": ns["id"] })).await;
    let (_, rack) = post(&app, "/v1/objects", json!({ "name": "rack", "parent": site["id"] })).await;

    let (status, record) = post(
        &app,
        "/v1/grants/object",
        json!({ "subject": alice["id"], "resource": site["id"], "action": "WRITE" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["inherit"], false);

    let (_, body) = post(
        &app,
        "/v1/check",
        json!({ "subject": alice["id"], "resource": rack["id"], "action": "WRITE" }),
    )
    .await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let app = test_app();
    let (_, alice) = post(&app, "/v1/accounts", json!({ "name": "alice" })).await;
    let (_, ns) = post(&app, "/v1/namespaces", json!({ "name": "acme" })).await;

    // InvalidAction
    let (status, body) = post(
        &app,
        "/v1/check",
        json!({ "subject": alice["id"], "resource": ns["id"], "action": "DELETE" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("DELETE"));

    // InvalidAccount
    let (status, _) = post(
        &app,
        "/v1/grants/namespace",
        json!({ "subject": ns["id"], "namespace": ns["id"], "action": "READ" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // ResourceNotFound
    let (status, _) = post(
        &app,
        "/v1/grants/object",
        json!({ "subject": alice["id"], "resource": "missing", "action": "READ" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/v1/namespaces/globex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/v1/objects", json!({ "name": "x", "parent": "ghost" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Conflicts
    let (status, _) = post(&app, "/v1/namespaces", json!({ "name": "acme" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = post(&app, "/v1/accounts", json!({ "name": "alice" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
