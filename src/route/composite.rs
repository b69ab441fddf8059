//! Ordered concatenation of locators.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Route, RouteDefinitionLocator, RouteLocator};
use crate::definition::RouteDefinition;

/// Definitions of every delegate, in delegate order.
pub struct CompositeRouteDefinitionLocator {
    delegates: Vec<Arc<dyn RouteDefinitionLocator>>,
}

impl CompositeRouteDefinitionLocator {
    pub fn new(delegates: Vec<Arc<dyn RouteDefinitionLocator>>) -> Self {
        Self { delegates }
    }
}

#[async_trait]
impl RouteDefinitionLocator for CompositeRouteDefinitionLocator {
    async fn route_definitions(&self) -> Vec<RouteDefinition> {
        let mut definitions = Vec::new();
        for delegate in &self.delegates {
            definitions.extend(delegate.route_definitions().await);
        }
        definitions
    }
}

/// Routes of every delegate, in delegate order.
pub struct CompositeRouteLocator {
    delegates: Vec<Arc<dyn RouteLocator>>,
}

impl CompositeRouteLocator {
    pub fn new(delegates: Vec<Arc<dyn RouteLocator>>) -> Self {
        Self { delegates }
    }
}

#[async_trait]
impl RouteLocator for CompositeRouteLocator {
    async fn routes(&self) -> Vec<Arc<Route>> {
        let mut routes = Vec::new();
        for delegate in &self.delegates {
            routes.extend(delegate.routes().await);
        }
        routes
    }
}
