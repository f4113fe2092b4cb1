use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::authz::context::RequestCtx;
use crate::authz::errors::AuthzError;
use crate::authz::graph::{GraphRead, ResourceGraph};
use crate::authz::types::{EdgeLabel, EdgeTarget, Kind, NodeId, Permission};
use crate::authz::validate::{facet_satisfies, require_permission};

/// Answers "may `subject` perform `permission` on `target`?" against a
/// read-consistent view of the resource graph. Never mutates it.
#[derive(Clone)]
pub struct AuthorizationEngine {
    graph: Arc<dyn ResourceGraph>,
}

impl AuthorizationEngine {
    pub fn new(graph: Arc<dyn ResourceGraph>) -> Self {
        Self { graph }
    }

    /// String-action entry point. The action is validated before anything
    /// else, so a malformed action fails even for self-access.
    pub async fn is_authorized_action(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        target: &str,
        action: &str,
    ) -> Result<bool, AuthzError> {
        let permission = require_permission(action)?;
        self.is_authorized(ctx, subject, target, permission).await
    }

    /// Evaluates, in order and short-circuiting:
    /// 1. self-access,
    /// 2. a direct object grant on `target`,
    /// 3. a direct namespace grant on `target`,
    /// 4. an inheriting object grant on a direct container of `target`,
    /// 5. reachability of `target` from any qualifying grant root over
    ///    `owns`/`contains` edges.
    ///
    /// Unknown ids simply never match. Store failures and cancellation are
    /// errors, never a denial.
    pub async fn is_authorized(
        &self,
        ctx: &RequestCtx,
        subject: &str,
        target: &str,
        permission: Permission,
    ) -> Result<bool, AuthzError> {
        if subject == target {
            tracing::debug!(subject, target, %permission, via = "self", "access granted");
            return Ok(true);
        }

        let view = ctx.run(self.graph.read()).await?;

        let object_grants = ctx
            .run(view.edges_from(subject, EdgeLabel::AccessTo))
            .await?;
        if object_grants
            .iter()
            .any(|g| g.to == target && facet_satisfies(g.facets.permission, permission))
        {
            tracing::debug!(subject, target, %permission, via = "direct", "access granted");
            return Ok(true);
        }

        let namespace_grants = ctx
            .run(view.edges_from(subject, EdgeLabel::AccessToNamespace))
            .await?;
        if namespace_grants
            .iter()
            .any(|g| g.to == target && facet_satisfies(g.facets.permission, permission))
        {
            tracing::debug!(subject, target, %permission, via = "namespace", "access granted");
            return Ok(true);
        }

        let inheriting: Vec<&EdgeTarget> = object_grants
            .iter()
            .filter(|g| g.facets.inherits() && facet_satisfies(g.facets.permission, permission))
            .collect();

        for grant in &inheriting {
            let children = ctx
                .run(view.edges_from(&grant.to, EdgeLabel::Contains))
                .await?;
            if children.iter().any(|c| c.to == target) {
                tracing::debug!(subject, target, %permission, via = "one_hop", "access granted");
                return Ok(true);
            }
        }

        let mut roots: Vec<(NodeId, Kind)> = inheriting
            .iter()
            .map(|g| (g.to.clone(), Kind::Object))
            .collect();
        roots.extend(
            namespace_grants
                .iter()
                .filter(|g| facet_satisfies(g.facets.permission, permission))
                .map(|g| (g.to.clone(), Kind::Namespace)),
        );

        if reachable(ctx, &*view, roots, target).await? {
            tracing::debug!(subject, target, %permission, via = "inherited", "access granted");
            return Ok(true);
        }

        tracing::debug!(subject, target, %permission, "access denied");
        Ok(false)
    }
}

/// Breadth-first search from `roots` over the structural edges only:
/// namespaces expand along `owns`, objects along `contains`. Each node is
/// expanded at most once, so shared subtrees and stray cycles terminate.
async fn reachable<V>(
    ctx: &RequestCtx,
    view: &V,
    roots: Vec<(NodeId, Kind)>,
    target: &str,
) -> Result<bool, AuthzError>
where
    V: GraphRead + ?Sized,
{
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<(NodeId, Kind)> = VecDeque::new();

    for (id, kind) in roots {
        if id == target {
            return Ok(true);
        }
        if visited.insert(id.clone()) {
            queue.push_back((id, kind));
        }
    }

    while let Some((id, kind)) = queue.pop_front() {
        let label = match kind {
            Kind::Namespace => EdgeLabel::Owns,
            Kind::Object => EdgeLabel::Contains,
            Kind::Account => continue,
        };
        let children = ctx.run(view.edges_from(&id, label)).await?;
        for child in children {
            if child.to == target {
                return Ok(true);
            }
            if visited.insert(child.to.clone()) {
                queue.push_back((child.to, Kind::Object));
            }
        }
    }

    Ok(false)
}
