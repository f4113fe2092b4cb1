use std::sync::Arc;

use crate::authz::context::RequestCtx;
use crate::authz::errors::AuthzError;
use crate::authz::graph::{GraphRead, GraphWrite, ResourceGraph};
use crate::authz::types::{GrantRecord, GrantScope, Kind, Permission};
use crate::authz::validate::{
    require_account, require_grant_target, require_namespace, require_permission,
};

/// Records access grants as edges. Each call validates and inserts inside
/// one unit of work, so readers see either none or all of it.
#[derive(Clone)]
pub struct GrantStore {
    graph: Arc<dyn ResourceGraph>,
}

impl GrantStore {
    pub fn new(graph: Arc<dyn ResourceGraph>) -> Self {
        Self { graph }
    }

    /// Grant `permission` on a namespace or object. `inherit` only applies
    /// to object targets; namespace grants always propagate.
    pub async fn grant_object_access(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        target: &str,
        permission: Permission,
        inherit: bool,
    ) -> Result<GrantRecord, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;

        ctx.run(require_account(&*txn, subject)).await?;
        let kind = ctx.run(require_grant_target(&*txn, target)).await?;

        let grant = match kind {
            Kind::Namespace => GrantRecord {
                subject: subject.to_string(),
                target: target.to_string(),
                scope: GrantScope::Namespace,
                permission,
                inherit: true,
            },
            _ => GrantRecord {
                subject: subject.to_string(),
                target: target.to_string(),
                scope: GrantScope::Object,
                permission,
                inherit,
            },
        };

        self.insert(ctx, txn, grant).await
    }

    pub async fn grant_namespace_access(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        namespace: &str,
        permission: Permission,
    ) -> Result<GrantRecord, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;

        ctx.run(require_account(&*txn, subject)).await?;
        ctx.run(require_namespace(&*txn, namespace)).await?;

        let grant = GrantRecord {
            subject: subject.to_string(),
            target: namespace.to_string(),
            scope: GrantScope::Namespace,
            permission,
            inherit: true,
        };
        self.insert(ctx, txn, grant).await
    }

    /// Like [`Self::grant_namespace_access`], resolving the namespace name
    /// inside the same unit of work.
    pub async fn grant_namespace_access_by_name(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        namespace_name: &str,
        permission: Permission,
    ) -> Result<GrantRecord, AuthzError> {
        let txn = ctx.run(self.graph.write()).await?;

        ctx.run(require_account(&*txn, subject)).await?;
        let namespace = ctx
            .run(txn.node_by_name(Kind::Namespace, namespace_name))
            .await?
            .ok_or_else(|| AuthzError::ResourceNotFound(namespace_name.to_string()))?;

        let grant = GrantRecord {
            subject: subject.to_string(),
            target: namespace.id,
            scope: GrantScope::Namespace,
            permission,
            inherit: true,
        };
        self.insert(ctx, txn, grant).await
    }

    /// String-action form of [`Self::grant_object_access`].
    pub async fn grant_object_action(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        target: &str,
        action: &str,
        inherit: bool,
    ) -> Result<GrantRecord, AuthzError> {
        let permission = require_permission(action)?;
        self.grant_object_access(ctx, subject, target, permission, inherit)
            .await
    }

    /// String-action form of [`Self::grant_namespace_access`].
    pub async fn grant_namespace_action(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        namespace: &str,
        action: &str,
    ) -> Result<GrantRecord, AuthzError> {
        let permission = require_permission(action)?;
        self.grant_namespace_access(ctx, subject, namespace, permission)
            .await
    }

    async fn insert(
        &self,
        ctx: &RequestCtx,
        txn: Box<dyn GraphWrite>,
        grant: GrantRecord,
    ) -> Result<GrantRecord, AuthzError> {
        ctx.run(txn.add_edge(
            &grant.subject,
            &grant.target,
            grant.label(),
            grant.facets(),
        ))
        .await?;
        ctx.run(txn.commit()).await?;

        tracing::info!(
            subject = %grant.subject,
            target = %grant.target,
            label = %grant.label(),
            permission = %grant.permission,
            inherit = grant.inherit,
            "Recorded grant"
        );
        Ok(grant)
    }
}
