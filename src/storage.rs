use async_trait::async_trait;
use base64ct::Encoding;
use chrono::Utc;
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::authz::errors::AuthzError;
use crate::authz::graph::{GraphRead, GraphWrite, ResourceGraph};
use crate::authz::types::{EdgeLabel, EdgeTarget, Facets, Kind, Node};
use crate::entities;
use crate::errors::CanopyError;
use crate::settings::Database as DbCfg;

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, CanopyError> {
    let db = Database::connect(&cfg.url).await?;
    Ok(db)
}

/// Random opaque node id.
pub fn random_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

/// Resource graph persisted through sea-orm. Every read view and every
/// write is its own database transaction.
#[derive(Debug, Clone)]
pub struct SqlGraph {
    db: DatabaseConnection,
}

impl SqlGraph {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl ResourceGraph for SqlGraph {
    async fn read(&self) -> Result<Box<dyn GraphRead>, AuthzError> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SqlTxn { txn }))
    }

    async fn write(&self) -> Result<Box<dyn GraphWrite>, AuthzError> {
        let txn = self.db.begin().await?;
        Ok(Box::new(SqlTxn { txn }))
    }
}

/// Rolled back on drop unless committed.
struct SqlTxn {
    txn: DatabaseTransaction,
}

fn node_from_model(model: entities::node::Model) -> Result<Node, AuthzError> {
    let kind = Kind::parse(&model.kind).ok_or_else(|| {
        AuthzError::StoreFailure(format!(
            "node `{}` has unknown kind `{}`",
            model.id, model.kind
        ))
    })?;
    Ok(Node {
        id: model.id,
        kind,
        name: model.name,
        enabled: model.enabled != 0,
    })
}

fn edge_from_model(model: entities::edge::Model) -> Result<EdgeTarget, AuthzError> {
    let permission = model
        .permission
        .map(|p| {
            p.parse().map_err(|_| {
                AuthzError::StoreFailure(format!(
                    "edge {} has unknown permission facet `{p}`",
                    model.id
                ))
            })
        })
        .transpose()?;
    Ok(EdgeTarget {
        to: model.to_id,
        facets: Facets {
            permission,
            inherit: model.inherit.map(|v| v != 0),
        },
    })
}

#[async_trait]
impl GraphRead for SqlTxn {
    async fn node(&self, id: &str) -> Result<Option<Node>, AuthzError> {
        entities::Node::find_by_id(id.to_string())
            .one(&self.txn)
            .await?
            .map(node_from_model)
            .transpose()
    }

    async fn edges_from(
        &self,
        id: &str,
        label: EdgeLabel,
    ) -> Result<Vec<EdgeTarget>, AuthzError> {
        use entities::edge::{Column, Entity};

        Entity::find()
            .filter(Column::FromId.eq(id))
            .filter(Column::Label.eq(label.as_str()))
            .order_by_asc(Column::Id)
            .all(&self.txn)
            .await?
            .into_iter()
            .map(edge_from_model)
            .collect()
    }

    async fn node_by_name(&self, kind: Kind, name: &str) -> Result<Option<Node>, AuthzError> {
        use entities::node::{Column, Entity};

        Entity::find()
            .filter(Column::Kind.eq(kind.as_str()))
            .filter(Column::Name.eq(name))
            .order_by_asc(Column::CreatedAt)
            .one(&self.txn)
            .await?
            .map(node_from_model)
            .transpose()
    }
}

#[async_trait]
impl GraphWrite for SqlTxn {
    async fn add_node(&self, node: Node) -> Result<(), AuthzError> {
        let model = entities::node::ActiveModel {
            id: Set(node.id),
            kind: Set(node.kind.as_str().to_string()),
            name: Set(node.name),
            enabled: Set(i64::from(node.enabled)),
            created_at: Set(Utc::now().timestamp()),
        };
        model.insert(&self.txn).await?;
        Ok(())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), AuthzError> {
        let model = entities::Node::find_by_id(id.to_string())
            .one(&self.txn)
            .await?
            .ok_or_else(|| AuthzError::ResourceNotFound(id.to_string()))?;
        let mut active: entities::node::ActiveModel = model.into();
        active.enabled = Set(i64::from(enabled));
        active.update(&self.txn).await?;
        Ok(())
    }

    async fn add_edge(
        &self,
        from: &str,
        to: &str,
        label: EdgeLabel,
        facets: Facets,
    ) -> Result<(), AuthzError> {
        let model = entities::edge::ActiveModel {
            from_id: Set(from.to_string()),
            to_id: Set(to.to_string()),
            label: Set(label.as_str().to_string()),
            permission: Set(facets.permission.map(|p| p.as_str().to_string())),
            inherit: Set(facets.inherit.map(i64::from)),
            created_at: Set(Utc::now().timestamp()),
            ..Default::default()
        };
        model.insert(&self.txn).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AuthzError> {
        self.txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::types::Permission;
    use sea_orm_migration::MigratorTrait;
    use tempfile::NamedTempFile;

    /// Test database helper that keeps temp file alive
    struct TestDb {
        graph: SqlGraph,
        _temp_file: NamedTempFile,
    }

    impl TestDb {
        async fn new() -> Self {
            let temp_file = NamedTempFile::new().expect("Failed to create temp file");
            let db_path = temp_file.path().to_str().expect("Invalid temp file path");
            let db_url = format!("sqlite://{}?mode=rwc", db_path);

            let connection = Database::connect(&db_url)
                .await
                .expect("Failed to connect to test database");

            migration::Migrator::up(&connection, None)
                .await
                .expect("Failed to run migrations");

            Self {
                graph: SqlGraph::new(connection),
                _temp_file: temp_file,
            }
        }
    }

    #[test]
    fn test_random_id_is_url_safe() {
        let a = random_id();
        let b = random_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_node_round_trip() {
        let db = TestDb::new().await;

        let txn = db.graph.write().await.unwrap();
        txn.add_node(Node::new("n1", Kind::Namespace, Some("acme")))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let view = db.graph.read().await.unwrap();
        let node = view.node("n1").await.unwrap().unwrap();
        assert_eq!(node.kind, Kind::Namespace);
        assert_eq!(node.name.as_deref(), Some("acme"));
        assert!(node.enabled);
        assert_eq!(view.kind_of("missing").await.unwrap(), None);

        let by_name = view.node_by_name(Kind::Namespace, "acme").await.unwrap();
        assert_eq!(by_name.map(|n| n.id), Some("n1".to_string()));
    }

    #[tokio::test]
    async fn test_edges_keep_facets_and_order() {
        let db = TestDb::new().await;

        let txn = db.graph.write().await.unwrap();
        txn.add_node(Node::new("a1", Kind::Account, Some("alice")))
            .await
            .unwrap();
        txn.add_node(Node::new("o1", Kind::Object, None))
            .await
            .unwrap();
        txn.add_node(Node::new("o2", Kind::Object, None))
            .await
            .unwrap();
        txn.add_edge(
            "a1",
            "o1",
            EdgeLabel::AccessTo,
            Facets::object_grant(Permission::Write, true),
        )
        .await
        .unwrap();
        txn.add_edge(
            "a1",
            "o2",
            EdgeLabel::AccessTo,
            Facets::object_grant(Permission::Read, false),
        )
        .await
        .unwrap();
        txn.add_edge("o1", "o2", EdgeLabel::Contains, Facets::structural())
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let view = db.graph.read().await.unwrap();
        let grants = view.edges_from("a1", EdgeLabel::AccessTo).await.unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].to, "o1");
        assert_eq!(grants[0].facets, Facets::object_grant(Permission::Write, true));
        assert_eq!(grants[1].facets, Facets::object_grant(Permission::Read, false));

        let children = view.edges_from("o1", EdgeLabel::Contains).await.unwrap();
        assert_eq!(children[0].facets, Facets::structural());
        assert!(view
            .edges_from("o1", EdgeLabel::Owns)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = TestDb::new().await;
        {
            let txn = db.graph.write().await.unwrap();
            txn.add_node(Node::new("a1", Kind::Account, None))
                .await
                .unwrap();
        }
        let view = db.graph.read().await.unwrap();
        assert!(view.node("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let db = TestDb::new().await;
        let txn = db.graph.write().await.unwrap();
        txn.add_node(Node::new("a1", Kind::Account, None))
            .await
            .unwrap();
        txn.set_enabled("a1", false).await.unwrap();
        txn.commit().await.unwrap();

        let view = db.graph.read().await.unwrap();
        assert!(!view.node("a1").await.unwrap().unwrap().enabled);
    }
}
