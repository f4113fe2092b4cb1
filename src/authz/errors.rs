use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Invalid account `{0}`")]
    #[diagnostic(
        code(canopy::authz::invalid_account),
        help("Grant subjects must be existing, enabled account nodes")
    )]
    InvalidAccount(String),

    #[error("Resource `{0}` does not exist")]
    #[diagnostic(
        code(canopy::authz::resource_not_found),
        help("Grant targets must be namespace or object nodes")
    )]
    ResourceNotFound(String),

    #[error("Invalid action `{0}`")]
    #[diagnostic(
        code(canopy::authz::invalid_action),
        help("Supported actions: \"READ\", \"WRITE\"")
    )]
    InvalidAction(String),

    #[error("Namespace `{0}` already exists")]
    #[diagnostic(code(canopy::authz::namespace_exists))]
    NamespaceExists(String),

    #[error("Account `{0}` already exists")]
    #[diagnostic(code(canopy::authz::account_exists))]
    AccountExists(String),

    #[error("Store failure: {0}")]
    #[diagnostic(code(canopy::authz::store))]
    StoreFailure(String),

    #[error("Operation cancelled")]
    #[diagnostic(code(canopy::authz::cancelled))]
    Cancelled,

    #[error("Deadline exceeded")]
    #[diagnostic(
        code(canopy::authz::deadline_exceeded),
        help("Raise graph.request_timeout_ms if the store is slow under load")
    )]
    DeadlineExceeded,

    #[error("Failed to load topology file `{path}`")]
    #[diagnostic(
        code(canopy::authz::topology_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    TopologyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid topology: {0}")]
    #[diagnostic(
        code(canopy::authz::invalid_topology),
        help("Topology files contain `account`, `namespace` (with nested `object`) and `grant` KDL nodes")
    )]
    InvalidTopology(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(canopy::authz::kdl_parse),
        help("Check the KDL syntax against https://kdl.dev")
    )]
    KdlParse(String),
}

impl From<sea_orm::DbErr> for AuthzError {
    fn from(value: sea_orm::DbErr) -> Self {
        AuthzError::StoreFailure(value.to_string())
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthzError::InvalidAccount(_)
            | AuthzError::InvalidAction(_)
            | AuthzError::InvalidTopology(_)
            | AuthzError::KdlParse(_) => StatusCode::BAD_REQUEST,
            AuthzError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AuthzError::NamespaceExists(_) | AuthzError::AccountExists(_) => StatusCode::CONFLICT,
            AuthzError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            AuthzError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AuthzError::StoreFailure(_) | AuthzError::TopologyLoadError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
