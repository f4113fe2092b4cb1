use std::sync::Arc;

use canopy::authz::graph::ResourceGraph;
use canopy::storage::SqlGraph;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    graph: Arc<SqlGraph>,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
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
            graph: Arc::new(SqlGraph::new(connection)),
            _temp_file: temp_file,
        }
    }

    /// Resource graph backed by this database
    pub fn graph(&self) -> Arc<dyn ResourceGraph> {
        self.graph.clone()
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.graph.connection()
    }
}
