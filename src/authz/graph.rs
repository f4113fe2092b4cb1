//! Resource graph abstraction and the in-memory implementation.
//!
//! Nodes are accounts, namespaces and objects; edges are typed by
//! [`EdgeLabel`] and carry grant [`Facets`]. Every access goes through a
//! unit of work: [`ResourceGraph::read`] hands out a read-consistent view,
//! [`ResourceGraph::write`] an atomic transaction that publishes nothing
//! until [`GraphWrite::commit`]. Dropping an uncommitted transaction rolls
//! it back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::authz::errors::AuthzError;
use crate::authz::types::{EdgeLabel, EdgeTarget, Facets, Kind, Node, NodeId};

#[async_trait]
pub trait GraphRead: Send + Sync {
    async fn node(&self, id: &str) -> Result<Option<Node>, AuthzError>;

    async fn kind_of(&self, id: &str) -> Result<Option<Kind>, AuthzError> {
        Ok(self.node(id).await?.map(|n| n.kind))
    }

    /// Outgoing edges of `label`, in insertion order. Each call returns a
    /// fresh owned snapshot.
    async fn edges_from(&self, id: &str, label: EdgeLabel)
        -> Result<Vec<EdgeTarget>, AuthzError>;

    /// First node of `kind` created with `name`.
    async fn node_by_name(&self, kind: Kind, name: &str) -> Result<Option<Node>, AuthzError>;
}

#[async_trait]
pub trait GraphWrite: GraphRead {
    async fn add_node(&self, node: Node) -> Result<(), AuthzError>;

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), AuthzError>;

    /// Insert a directed edge. Duplicates are allowed.
    async fn add_edge(
        &self,
        from: &str,
        to: &str,
        label: EdgeLabel,
        facets: Facets,
    ) -> Result<(), AuthzError>;

    async fn commit(self: Box<Self>) -> Result<(), AuthzError>;
}

#[async_trait]
pub trait ResourceGraph: Send + Sync {
    async fn read(&self) -> Result<Box<dyn GraphRead>, AuthzError>;

    async fn write(&self) -> Result<Box<dyn GraphWrite>, AuthzError>;
}

#[derive(Debug, Clone, Default)]
struct GraphData {
    nodes: HashMap<NodeId, Node>,
    names: HashMap<(Kind, String), NodeId>,
    edges: HashMap<(NodeId, EdgeLabel), Vec<EdgeTarget>>,
}

impl GraphData {
    fn node_by_name(&self, kind: Kind, name: &str) -> Option<Node> {
        self.names
            .get(&(kind, name.to_string()))
            .and_then(|id| self.nodes.get(id))
            .cloned()
    }

    fn edges_from(&self, id: &str, label: EdgeLabel) -> Vec<EdgeTarget> {
        self.edges
            .get(&(id.to_string(), label))
            .cloned()
            .unwrap_or_default()
    }

    fn add_node(&mut self, node: Node) -> Result<(), AuthzError> {
        if self.nodes.contains_key(&node.id) {
            return Err(AuthzError::StoreFailure(format!(
                "node `{}` already exists",
                node.id
            )));
        }
        if let Some(name) = &node.name {
            self.names
                .entry((node.kind, name.clone()))
                .or_insert_with(|| node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        label: EdgeLabel,
        facets: Facets,
    ) -> Result<(), AuthzError> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(AuthzError::StoreFailure(format!(
                    "edge endpoint `{endpoint}` does not exist"
                )));
            }
        }
        self.edges
            .entry((from.to_string(), label))
            .or_default()
            .push(EdgeTarget {
                to: to.to_string(),
                facets,
            });
        Ok(())
    }

    fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }
}

fn poisoned<T>(_: T) -> AuthzError {
    AuthzError::StoreFailure("in-memory graph lock poisoned".into())
}

/// Owned in-memory graph.
///
/// Readers get an `Arc` of the last committed state and never wait on
/// writers. Writers are serialized, mutate a private copy, and swap it in
/// on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    committed: Arc<RwLock<Arc<GraphData>>>,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<Arc<GraphData>, AuthzError> {
        Ok(self.committed.read().map_err(poisoned)?.clone())
    }

    pub fn node_count(&self) -> Result<usize, AuthzError> {
        Ok(self.snapshot()?.nodes.len())
    }

    pub fn edge_count(&self) -> Result<usize, AuthzError> {
        Ok(self.snapshot()?.edge_count())
    }
}

#[async_trait]
impl ResourceGraph for MemoryGraph {
    async fn read(&self) -> Result<Box<dyn GraphRead>, AuthzError> {
        Ok(Box::new(MemorySnapshot {
            data: self.snapshot()?,
        }))
    }

    async fn write(&self) -> Result<Box<dyn GraphWrite>, AuthzError> {
        let guard = self.writer.clone().lock_owned().await;
        // Taken after acquiring the writer lock so no commit can slip in between.
        let base = self.snapshot()?;
        Ok(Box::new(MemoryTxn {
            working: Mutex::new((*base).clone()),
            committed: self.committed.clone(),
            _guard: guard,
        }))
    }
}

struct MemorySnapshot {
    data: Arc<GraphData>,
}

#[async_trait]
impl GraphRead for MemorySnapshot {
    async fn node(&self, id: &str) -> Result<Option<Node>, AuthzError> {
        Ok(self.data.nodes.get(id).cloned())
    }

    async fn edges_from(
        &self,
        id: &str,
        label: EdgeLabel,
    ) -> Result<Vec<EdgeTarget>, AuthzError> {
        Ok(self.data.edges_from(id, label))
    }

    async fn node_by_name(&self, kind: Kind, name: &str) -> Result<Option<Node>, AuthzError> {
        Ok(self.data.node_by_name(kind, name))
    }
}

struct MemoryTxn {
    working: Mutex<GraphData>,
    committed: Arc<RwLock<Arc<GraphData>>>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl GraphRead for MemoryTxn {
    async fn node(&self, id: &str) -> Result<Option<Node>, AuthzError> {
        Ok(self.working.lock().map_err(poisoned)?.nodes.get(id).cloned())
    }

    async fn edges_from(
        &self,
        id: &str,
        label: EdgeLabel,
    ) -> Result<Vec<EdgeTarget>, AuthzError> {
        Ok(self.working.lock().map_err(poisoned)?.edges_from(id, label))
    }

    async fn node_by_name(&self, kind: Kind, name: &str) -> Result<Option<Node>, AuthzError> {
        Ok(self
            .working
            .lock()
            .map_err(poisoned)?
            .node_by_name(kind, name))
    }
}

#[async_trait]
impl GraphWrite for MemoryTxn {
    async fn add_node(&self, node: Node) -> Result<(), AuthzError> {
        self.working.lock().map_err(poisoned)?.add_node(node)
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), AuthzError> {
        let mut data = self.working.lock().map_err(poisoned)?;
        let node = data
            .nodes
            .get_mut(id)
            .ok_or_else(|| AuthzError::ResourceNotFound(id.to_string()))?;
        node.enabled = enabled;
        Ok(())
    }

    async fn add_edge(
        &self,
        from: &str,
        to: &str,
        label: EdgeLabel,
        facets: Facets,
    ) -> Result<(), AuthzError> {
        self.working
            .lock()
            .map_err(poisoned)?
            .add_edge(from, to, label, facets)
    }

    async fn commit(self: Box<Self>) -> Result<(), AuthzError> {
        let MemoryTxn {
            working,
            committed,
            _guard,
        } = *self;
        let data = working.into_inner().map_err(poisoned)?;
        *committed.write().map_err(poisoned)? = Arc::new(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::types::Permission;

    async fn seed(graph: &MemoryGraph) {
        let txn = graph.write().await.unwrap();
        txn.add_node(Node::new("a1", Kind::Account, Some("alice")))
            .await
            .unwrap();
        txn.add_node(Node::new("n1", Kind::Namespace, Some("acme")))
            .await
            .unwrap();
        txn.add_node(Node::new("o1", Kind::Object, Some("building")))
            .await
            .unwrap();
        txn.add_edge("n1", "o1", EdgeLabel::Owns, Facets::structural())
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_kind_lookup() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let view = graph.read().await.unwrap();
        assert_eq!(view.kind_of("a1").await.unwrap(), Some(Kind::Account));
        assert_eq!(view.kind_of("n1").await.unwrap(), Some(Kind::Namespace));
        assert_eq!(view.kind_of("o1").await.unwrap(), Some(Kind::Object));
        assert_eq!(view.kind_of("missing").await.unwrap(), None);

        let ns = view.node_by_name(Kind::Namespace, "acme").await.unwrap();
        assert_eq!(ns.map(|n| n.id), Some("n1".to_string()));
        assert!(view
            .node_by_name(Kind::Object, "acme")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_edges_from_filters_by_label() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let view = graph.read().await.unwrap();
        let owned = view.edges_from("n1", EdgeLabel::Owns).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].to, "o1");
        assert!(view
            .edges_from("n1", EdgeLabel::Contains)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_edges_are_kept() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let txn = graph.write().await.unwrap();
        let facets = Facets::object_grant(Permission::Read, false);
        txn.add_edge("a1", "o1", EdgeLabel::AccessTo, facets)
            .await
            .unwrap();
        txn.add_edge("a1", "o1", EdgeLabel::AccessTo, facets)
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let view = graph.read().await.unwrap();
        let grants = view.edges_from("a1", EdgeLabel::AccessTo).await.unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(graph.edge_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_uncommitted_write_is_invisible() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let before = graph.read().await.unwrap();
        {
            let txn = graph.write().await.unwrap();
            txn.add_edge(
                "a1",
                "n1",
                EdgeLabel::AccessToNamespace,
                Facets::namespace_grant(Permission::Read),
            )
            .await
            .unwrap();
            // Dropped without commit
        }

        let after = graph.read().await.unwrap();
        for view in [&before, &after] {
            assert!(view
                .edges_from("a1", EdgeLabel::AccessToNamespace)
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_commit() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let before = graph.read().await.unwrap();
        let txn = graph.write().await.unwrap();
        txn.add_node(Node::new("o2", Kind::Object, None))
            .await
            .unwrap();
        txn.add_edge("o1", "o2", EdgeLabel::Contains, Facets::structural())
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert!(before.node("o2").await.unwrap().is_none());
        let after = graph.read().await.unwrap();
        assert_eq!(
            after.edges_from("o1", EdgeLabel::Contains).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_edge_to_missing_node_fails() {
        let graph = MemoryGraph::new();
        seed(&graph).await;

        let txn = graph.write().await.unwrap();
        let err = txn
            .add_edge("o1", "ghost", EdgeLabel::Contains, Facets::structural())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::StoreFailure(_)));
    }
}
