use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::authz::context::RequestCtx;
use crate::authz::types::{
    CheckRequest, CheckResponse, CreateNamedRequest, CreateObjectRequest, NamespaceGrantRequest,
    NamespaceResponse, ObjectGrantRequest,
};
use crate::authz::Authz;

#[derive(Clone)]
pub struct AppState {
    pub authz: Authz,
    pub request_timeout: Duration,
}

impl AppState {
    fn ctx(&self) -> RequestCtx {
        RequestCtx::with_timeout(self.request_timeout)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/check", post(handle_check))
        .route("/v1/grants/object", post(handle_object_grant))
        .route("/v1/grants/namespace", post(handle_namespace_grant))
        .route("/v1/accounts", post(handle_create_account))
        .route("/v1/namespaces", post(handle_create_namespace))
        .route("/v1/namespaces/{name}", get(handle_get_namespace))
        .route("/v1/objects", post(handle_create_object))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn handle_check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Response {
    let ctx = state.ctx();
    match state
        .authz
        .engine
        .is_authorized_action(&ctx, &req.subject, &req.resource, &req.action)
        .await
    {
        Ok(allowed) => Json(CheckResponse { allowed }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_object_grant(
    State(state): State<AppState>,
    Json(req): Json<ObjectGrantRequest>,
) -> Response {
    let ctx = state.ctx();
    match state
        .authz
        .grants
        .grant_object_action(&ctx, &req.subject, &req.resource, &req.action, req.inherit)
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_namespace_grant(
    State(state): State<AppState>,
    Json(req): Json<NamespaceGrantRequest>,
) -> Response {
    let ctx = state.ctx();
    match state
        .authz
        .grants
        .grant_namespace_action(&ctx, &req.subject, &req.namespace, &req.action)
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateNamedRequest>,
) -> Response {
    let ctx = state.ctx();
    match state.authz.directory.create_account(&ctx, &req.name).await {
        Ok(node) => (StatusCode::CREATED, Json(node)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_create_namespace(
    State(state): State<AppState>,
    Json(req): Json<CreateNamedRequest>,
) -> Response {
    let ctx = state.ctx();
    match state.authz.directory.create_namespace(&ctx, &req.name).await {
        Ok(node) => (StatusCode::CREATED, Json(node)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_get_namespace(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let ctx = state.ctx();
    match state.authz.directory.get_namespace(&ctx, &name).await {
        Ok(node) => Json(NamespaceResponse {
            id: node.id,
            name: node.name.unwrap_or(name),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_create_object(
    State(state): State<AppState>,
    Json(req): Json<CreateObjectRequest>,
) -> Response {
    let ctx = state.ctx();
    match state
        .authz
        .directory
        .create_object(&ctx, &req.name, &req.parent)
        .await
    {
        Ok(node) => (StatusCode::CREATED, Json(node)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
