//! Declarative resource topology, loaded from KDL.
//!
//! ```kdl
//! account "alice"
//! account "mallory" enabled=#false
//! namespace "acme" {
//!     object "building-1" {
//!         object "floor-1"
//!     }
//! }
//! grant "WRITE" to="alice" on="acme/building-1" inherit=#true
//! grant "READ" to="alice" namespace="acme"
//! ```

use std::path::Path;

use kdl::{KdlDocument, KdlNode};

use crate::authz::context::RequestCtx;
use crate::authz::errors::AuthzError;
use crate::authz::graph::{GraphRead, GraphWrite, ResourceGraph};
use crate::authz::types::{
    EdgeLabel, GrantRecord, GrantScope, Kind, Node, NodeId, Permission,
};
use crate::authz::validate::require_account;
use crate::directory::attach_object;
use crate::storage::random_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDef {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDef {
    pub name: String,
    pub children: Vec<ObjectDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDef {
    pub name: String,
    pub objects: Vec<ObjectDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantTarget {
    /// `namespace/object/…` path
    Object { path: Vec<String>, inherit: bool },
    Namespace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantDef {
    pub permission: Permission,
    pub account: String,
    pub target: GrantTarget,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTopology {
    pub accounts: Vec<AccountDef>,
    pub namespaces: Vec<NamespaceDef>,
    pub grants: Vec<GrantDef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologySummary {
    pub accounts: usize,
    pub namespaces: usize,
    pub objects: usize,
    pub grants: usize,
}

pub fn load_topology(path: &Path) -> Result<ParsedTopology, AuthzError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| AuthzError::TopologyLoadError {
            path: path.display().to_string(),
            source,
        })?;
    parse_topology(&contents)
}

/// Parse a KDL document string into a typed topology.
pub fn parse_topology(source: &str) -> Result<ParsedTopology, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut topology = ParsedTopology::default();

    for node in doc.nodes() {
        match node.name().value() {
            "account" => {
                let name = required_name(node, "account \"alice\"")?;
                let enabled = node
                    .get("enabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                topology.accounts.push(AccountDef { name, enabled });
            }
            "namespace" => {
                let name = required_name(node, "namespace \"acme\"")?;
                let objects = parse_objects(node)?;
                topology.namespaces.push(NamespaceDef { name, objects });
            }
            "grant" => topology.grants.push(parse_grant(node)?),
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(topology)
}

fn parse_objects(node: &KdlNode) -> Result<Vec<ObjectDef>, AuthzError> {
    let Some(children) = node.children() else {
        return Ok(Vec::new());
    };
    let mut objects = Vec::new();
    for child in children.nodes() {
        match child.name().value() {
            "object" => {
                let name = required_name(child, "object \"building-1\"")?;
                objects.push(ObjectDef {
                    name,
                    children: parse_objects(child)?,
                });
            }
            other => {
                return Err(AuthzError::InvalidTopology(format!(
                    "unexpected child `{other}` (only `object` nodes may be nested)"
                )));
            }
        }
    }
    Ok(objects)
}

fn parse_grant(node: &KdlNode) -> Result<GrantDef, AuthzError> {
    let action = first_string_arg(node).ok_or_else(|| {
        AuthzError::InvalidTopology(
            "grant node requires an action argument (e.g. grant \"READ\" to=\"alice\" namespace=\"acme\")"
                .into(),
        )
    })?;
    let permission: Permission = action.parse().map_err(|_| {
        AuthzError::InvalidTopology(format!(
            "grant has invalid action `{action}` (expected \"READ\" or \"WRITE\")"
        ))
    })?;

    let account = string_prop(node, "to")
        .ok_or_else(|| {
            AuthzError::InvalidTopology(format!("grant `{action}` missing `to` property"))
        })?
        .to_string();

    let target = match (string_prop(node, "on"), string_prop(node, "namespace")) {
        (Some(on), None) => {
            let path: Vec<String> = on.split('/').map(str::to_string).collect();
            if path.len() < 2 || path.iter().any(|s| s.is_empty()) {
                return Err(AuthzError::InvalidTopology(format!(
                    "invalid object path `{on}` in grant (expected \"namespace/object\")"
                )));
            }
            let inherit = node
                .get("inherit")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            GrantTarget::Object { path, inherit }
        }
        (None, Some(namespace)) => GrantTarget::Namespace(namespace.to_string()),
        _ => {
            return Err(AuthzError::InvalidTopology(format!(
                "grant `{action}` to `{account}` needs exactly one of `on` or `namespace`"
            )));
        }
    };

    Ok(GrantDef {
        permission,
        account,
        target,
    })
}

fn required_name(node: &KdlNode, example: &str) -> Result<String, AuthzError> {
    let kind = node.name().value();
    let name = first_string_arg(node).ok_or_else(|| {
        AuthzError::InvalidTopology(format!(
            "{kind} node requires a string argument (e.g. {example})"
        ))
    })?;
    if name.is_empty() || name.contains('/') {
        return Err(AuthzError::InvalidTopology(format!(
            "invalid {kind} name `{name}` (must be non-empty and contain no `/`)"
        )));
    }
    Ok(name)
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn string_prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

/// Apply a topology in one unit of work. Existing accounts and namespaces
/// are matched by name, objects by name under the same parent, and grants
/// identical to an existing edge are skipped, so re-applying the same file
/// changes nothing.
pub async fn apply_topology(
    ctx: &RequestCtx,
    graph: &dyn ResourceGraph,
    topology: &ParsedTopology,
) -> Result<TopologySummary, AuthzError> {
    let txn = ctx.run(graph.write()).await?;
    let mut summary = TopologySummary::default();

    for account in &topology.accounts {
        match ctx.run(txn.node_by_name(Kind::Account, &account.name)).await? {
            Some(existing) => {
                if existing.enabled != account.enabled {
                    ctx.run(txn.set_enabled(&existing.id, account.enabled))
                        .await?;
                }
            }
            None => {
                let mut node = Node::new(random_id(), Kind::Account, Some(&account.name));
                node.enabled = account.enabled;
                ctx.run(txn.add_node(node)).await?;
                summary.accounts += 1;
            }
        }
    }

    for namespace in &topology.namespaces {
        let id = match ctx
            .run(txn.node_by_name(Kind::Namespace, &namespace.name))
            .await?
        {
            Some(existing) => existing.id,
            None => {
                let node = Node::new(random_id(), Kind::Namespace, Some(&namespace.name));
                let id = node.id.clone();
                ctx.run(txn.add_node(node)).await?;
                summary.namespaces += 1;
                id
            }
        };
        apply_objects(ctx, &*txn, &id, Kind::Namespace, &namespace.objects, &mut summary).await?;
    }

    for grant in &topology.grants {
        let subject = ctx
            .run(txn.node_by_name(Kind::Account, &grant.account))
            .await?
            .ok_or_else(|| AuthzError::InvalidAccount(grant.account.clone()))?;
        ctx.run(require_account(&*txn, &subject.id)).await?;

        let record = match &grant.target {
            GrantTarget::Namespace(name) => {
                let ns = ctx
                    .run(txn.node_by_name(Kind::Namespace, name))
                    .await?
                    .ok_or_else(|| AuthzError::ResourceNotFound(name.clone()))?;
                GrantRecord {
                    subject: subject.id.clone(),
                    target: ns.id,
                    scope: GrantScope::Namespace,
                    permission: grant.permission,
                    inherit: true,
                }
            }
            GrantTarget::Object { path, inherit } => GrantRecord {
                subject: subject.id.clone(),
                target: resolve_path(ctx, &*txn, path).await?,
                scope: GrantScope::Object,
                permission: grant.permission,
                inherit: *inherit,
            },
        };

        let existing = ctx
            .run(txn.edges_from(&record.subject, record.label()))
            .await?;
        if existing
            .iter()
            .any(|e| e.to == record.target && e.facets == record.facets())
        {
            continue;
        }
        ctx.run(txn.add_edge(
            &record.subject,
            &record.target,
            record.label(),
            record.facets(),
        ))
        .await?;
        summary.grants += 1;
    }

    ctx.run(txn.commit()).await?;

    tracing::info!(
        accounts = summary.accounts,
        namespaces = summary.namespaces,
        objects = summary.objects,
        grants = summary.grants,
        "Applied resource topology"
    );
    Ok(summary)
}

async fn apply_objects(
    ctx: &RequestCtx,
    txn: &dyn GraphWrite,
    parent: &str,
    parent_kind: Kind,
    objects: &[ObjectDef],
    summary: &mut TopologySummary,
) -> Result<(), AuthzError> {
    // Explicit stack instead of async recursion.
    let mut pending: Vec<(NodeId, Kind, &ObjectDef)> = objects
        .iter()
        .map(|o| (parent.to_string(), parent_kind, o))
        .collect();

    while let Some((parent, parent_kind, object)) = pending.pop() {
        let id = match find_child(ctx, txn, &parent, parent_kind, &object.name).await? {
            Some(id) => id,
            None => {
                let node = Node::new(random_id(), Kind::Object, Some(&object.name));
                attach_object(ctx, txn, &node, &parent).await?;
                summary.objects += 1;
                node.id
            }
        };
        for child in &object.children {
            pending.push((id.clone(), Kind::Object, child));
        }
    }
    Ok(())
}

async fn find_child<V>(
    ctx: &RequestCtx,
    view: &V,
    parent: &str,
    parent_kind: Kind,
    name: &str,
) -> Result<Option<NodeId>, AuthzError>
where
    V: GraphRead + ?Sized,
{
    let label = match parent_kind {
        Kind::Namespace => EdgeLabel::Owns,
        _ => EdgeLabel::Contains,
    };
    for edge in ctx.run(view.edges_from(parent, label)).await? {
        if let Some(node) = ctx.run(view.node(&edge.to)).await? {
            if node.kind == Kind::Object && node.name.as_deref() == Some(name) {
                return Ok(Some(node.id));
            }
        }
    }
    Ok(None)
}

async fn resolve_path<V>(ctx: &RequestCtx, view: &V, path: &[String]) -> Result<NodeId, AuthzError>
where
    V: GraphRead + ?Sized,
{
    let not_found = || AuthzError::ResourceNotFound(path.join("/"));
    let (namespace, objects) = path.split_first().ok_or_else(not_found)?;

    let mut current = ctx
        .run(view.node_by_name(Kind::Namespace, namespace))
        .await?
        .ok_or_else(not_found)?
        .id;
    let mut kind = Kind::Namespace;
    for name in objects {
        current = find_child(ctx, view, &current, kind, name)
            .await?
            .ok_or_else(not_found)?;
        kind = Kind::Object;
    }
    Ok(current)
}
