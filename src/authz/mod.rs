pub mod context;
pub mod engine;
pub mod errors;
pub mod grants;
pub mod graph;
pub mod types;
pub mod validate;
pub mod web;

use std::sync::Arc;

use crate::directory::Directory;
use engine::AuthorizationEngine;
use grants::GrantStore;
use graph::ResourceGraph;

/// Engine, grant store and directory sharing one resource graph.
#[derive(Clone)]
pub struct Authz {
    pub graph: Arc<dyn ResourceGraph>,
    pub engine: AuthorizationEngine,
    pub grants: GrantStore,
    pub directory: Directory,
}

impl Authz {
    pub fn new(graph: Arc<dyn ResourceGraph>) -> Self {
        Self {
            engine: AuthorizationEngine::new(graph.clone()),
            grants: GrantStore::new(graph.clone()),
            directory: Directory::new(graph.clone()),
            graph,
        }
    }
}
