//! Writable in-memory definition store, fed by the admin API.
//!
//! Saving or deleting does not refresh the route table; callers publish
//! `RefreshRoutes` when they want the change to take effect.

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use super::RouteDefinitionLocator;
use crate::definition::RouteDefinition;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("route definition not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Default)]
pub struct InMemoryRouteDefinitionRepository {
    routes: RwLock<IndexMap<String, RouteDefinition>>,
}

impl InMemoryRouteDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id. A replaced definition keeps its position.
    pub async fn save(&self, definition: RouteDefinition) {
        info!(route_id = %definition.id, "Saving route definition");
        self.routes
            .write()
            .await
            .insert(definition.id.clone(), definition);
    }

    pub async fn delete(&self, id: &str) -> Result<RouteDefinition, RepositoryError> {
        let removed = self.routes.write().await.shift_remove(id);
        match removed {
            Some(definition) => {
                info!(route_id = %id, "Deleted route definition");
                Ok(definition)
            }
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    pub async fn get(&self, id: &str) -> Option<RouteDefinition> {
        self.routes.read().await.get(id).cloned()
    }
}

#[async_trait]
impl RouteDefinitionLocator for InMemoryRouteDefinitionRepository {
    async fn route_definitions(&self) -> Vec<RouteDefinition> {
        self.routes.read().await.values().cloned().collect()
    }
}
