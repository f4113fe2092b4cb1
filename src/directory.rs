//! Account and namespace directory.
//!
//! These are the store-and-retrieve collaborators around the authorization
//! core: they create accounts, namespaces and objects, and translate
//! namespace names into node ids. Ids are the only identity the engine
//! sees; names stop at this boundary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::authz::context::RequestCtx;
use crate::authz::errors::AuthzError;
use crate::authz::graph::{GraphRead, GraphWrite, ResourceGraph};
use crate::authz::types::{EdgeLabel, Facets, Kind, Node, NodeId};
use crate::storage::random_id;

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Whether `id` is an existing, enabled account.
    async fn exists(&self, ctx: &RequestCtx, id: &str) -> Result<bool, AuthzError>;
}

#[async_trait]
pub trait NamespaceRegistry: Send + Sync {
    async fn resolve(&self, ctx: &RequestCtx, name: &str) -> Result<NodeId, AuthzError>;

    async fn create(&self, ctx: &RequestCtx, name: &str) -> Result<NodeId, AuthzError>;
}

#[derive(Clone)]
pub struct Directory {
    graph: Arc<dyn ResourceGraph>,
}

impl Directory {
    pub fn new(graph: Arc<dyn ResourceGraph>) -> Self {
        Self { graph }
    }

    pub async fn create_account(&self, ctx: &RequestCtx, name: &str) -> Result<Node, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;
        if ctx
            .run(txn.node_by_name(Kind::Account, name))
            .await?
            .is_some()
        {
            return Err(AuthzError::AccountExists(name.to_string()));
        }

        let node = Node::new(random_id(), Kind::Account, Some(name));
        ctx.run(txn.add_node(node.clone())).await?;
        ctx.run(txn.commit()).await?;

        tracing::info!(id = %node.id, name, "Created account");
        Ok(node)
    }

    pub async fn set_account_enabled(
        &self,
        ctx: &RequestCtx,
        id: &str,
        enabled: bool,
    ) -> Result<(), AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;
        match ctx.run(txn.kind_of(id)).await? {
            Some(Kind::Account) => {}
            _ => return Err(AuthzError::InvalidAccount(id.to_string())),
        }
        ctx.run(txn.set_enabled(id, enabled)).await?;
        ctx.run(txn.commit()).await?;

        tracing::info!(id, enabled, "Updated account");
        Ok(())
    }

    pub async fn create_namespace(
        &self,
        ctx: &RequestCtx,
        name: &str,
    ) -> Result<Node, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;
        if ctx
            .run(txn.node_by_name(Kind::Namespace, name))
            .await?
            .is_some()
        {
            return Err(AuthzError::NamespaceExists(name.to_string()));
        }

        let node = Node::new(random_id(), Kind::Namespace, Some(name));
        ctx.run(txn.add_node(node.clone())).await?;
        ctx.run(txn.commit()).await?;

        tracing::info!(id = %node.id, name, "Created namespace");
        Ok(node)
    }

    pub async fn get_namespace(&self, ctx: &RequestCtx, name: &str) -> Result<Node, AuthzError> {
        let view = ctx.run(self.graph.read()).await?;
        ctx.run(view.node_by_name(Kind::Namespace, name))
            .await?
            .ok_or_else(|| AuthzError::ResourceNotFound(name.to_string()))
    }

    /// Create an object under `parent`: owned by it if `parent` is a
    /// namespace, contained by it if `parent` is an object.
    pub async fn create_object(
        &self,
        ctx: &RequestCtx,
        name: &str,
        parent: &str,
    ) -> Result<Node, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;
        let node = Node::new(random_id(), Kind::Object, Some(name));
        attach_object(ctx, &*txn, &node, parent).await?;
        ctx.run(txn.commit()).await?;

        tracing::info!(id = %node.id, name, parent, "Created object");
        Ok(node)
    }
}

/// Insert `node` and the structural edge from `parent`. The node is always
/// fresh, so the ownership/containment forest cannot gain a cycle.
pub(crate) async fn attach_object<W>(
    ctx: &RequestCtx,
    txn: &W,
    node: &Node,
    parent: &str,
) -> Result<(), AuthzError>
where
    W: GraphWrite + ?Sized,
{
    let label = match ctx.run(txn.kind_of(parent)).await? {
        Some(Kind::Namespace) => EdgeLabel::Owns,
        Some(Kind::Object) => EdgeLabel::Contains,
        _ => return Err(AuthzError::ResourceNotFound(parent.to_string())),
    };
    ctx.run(txn.add_node(node.clone())).await?;
    ctx.run(txn.add_edge(parent, &node.id, label, Facets::structural()))
        .await
}

#[async_trait]
impl AccountDirectory for Directory {
    async fn exists(&self, ctx: &RequestCtx, id: &str) -> Result<bool, AuthzError> {
        let view = ctx.run(self.graph.read()).await?;
        Ok(matches!(
            ctx.run(view.node(id)).await?,
            Some(node) if node.kind == Kind::Account && node.enabled
        ))
    }
}

#[async_trait]
impl NamespaceRegistry for Directory {
    async fn resolve(&self, ctx: &RequestCtx, name: &str) -> Result<NodeId, AuthzError> {
        Ok(self.get_namespace(ctx, name).await?.id)
    }

    async fn create(&self, ctx: &RequestCtx, name: &str) -> Result<NodeId, AuthzError> {
        Ok(self.create_namespace(ctx, name).await?.id)
    }
}
