use crate::authz::errors::AuthzError;
use crate::authz::graph::GraphRead;
use crate::authz::types::{Kind, Permission};

/// Parse a wire action ("READ" | "WRITE").
pub fn require_permission(level: &str) -> Result<Permission, AuthzError> {
    level.parse()
}

/// Whether a grant at `held` covers a request for `requested`.
pub fn satisfies(held: Permission, requested: Permission) -> bool {
    held >= requested
}

/// Grant facets without a permission never satisfy anything.
pub fn facet_satisfies(held: Option<Permission>, requested: Permission) -> bool {
    held.is_some_and(|p| satisfies(p, requested))
}

pub async fn require_account<V>(view: &V, id: &str) -> Result<(), AuthzError>
where
    V: GraphRead + ?Sized,
{
    match view.node(id).await? {
        Some(node) if node.kind == Kind::Account && node.enabled => Ok(()),
        _ => Err(AuthzError::InvalidAccount(id.to_string())),
    }
}

/// Resolve a grant target kind: namespace first, then object.
pub async fn require_grant_target<V>(view: &V, id: &str) -> Result<Kind, AuthzError>
where
    V: GraphRead + ?Sized,
{
    match view.kind_of(id).await? {
        Some(Kind::Namespace) => Ok(Kind::Namespace),
        Some(Kind::Object) => Ok(Kind::Object),
        _ => Err(AuthzError::ResourceNotFound(id.to_string())),
    }
}

pub async fn require_namespace<V>(view: &V, id: &str) -> Result<(), AuthzError>
where
    V: GraphRead + ?Sized,
{
    match view.kind_of(id).await? {
        Some(Kind::Namespace) => Ok(()),
        _ => Err(AuthzError::ResourceNotFound(id.to_string())),
    }
}
