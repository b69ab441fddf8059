//! Compiled routes and the locator chain that produces them.
//!
//! # Data Flow
//! ```text
//! PropertiesRouteDefinitionLocator ─┐
//! DiscoveryClientRouteDefinitionLocator ─┼→ CompositeRouteDefinitionLocator
//! InMemoryRouteDefinitionRepository ─┘            │
//!                                                  ▼
//!                                   RouteDefinitionRouteLocator (compile)
//!                                                  │
//!                                                  ▼
//!                                   CachingRouteLocator (sorted snapshot)
//! ```
//!
//! # Design Decisions
//! - `Route` is immutable and shared as `Arc<Route>`; a refresh builds new
//!   routes rather than mutating old ones
//! - Locators return whole tables; the cache swaps whole tables

pub mod caching;
pub mod composite;
pub mod definition_locator;
pub mod properties;
pub mod repository;

pub use caching::CachingRouteLocator;
pub use composite::{CompositeRouteDefinitionLocator, CompositeRouteLocator};
pub use definition_locator::RouteDefinitionRouteLocator;
pub use properties::PropertiesRouteDefinitionLocator;
pub use repository::InMemoryRouteDefinitionRepository;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::definition::RouteDefinition;
use crate::filter::OrderedFilter;
use crate::handler::RoutePredicate;

/// An executable route: target, order, combined predicate, sorted filters.
pub struct Route {
    id: String,
    uri: Url,
    order: i32,
    predicate: Arc<dyn RoutePredicate>,
    filters: Vec<OrderedFilter>,
}

impl Route {
    /// `filters` must already be in execution order.
    pub fn new(
        id: impl Into<String>,
        uri: Url,
        order: i32,
        predicate: Arc<dyn RoutePredicate>,
        filters: Vec<OrderedFilter>,
    ) -> Self {
        Self {
            id: id.into(),
            uri,
            order,
            predicate,
            filters,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn predicate(&self) -> &Arc<dyn RoutePredicate> {
        &self.predicate
    }

    pub fn filters(&self) -> &[OrderedFilter] {
        &self.filters
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("uri", &self.uri.as_str())
            .field("order", &self.order)
            .field("predicate", &self.predicate.name())
            .field("filters", &self.filters)
            .finish()
    }
}

/// Source of compiled routes.
#[async_trait]
pub trait RouteLocator: Send + Sync {
    async fn routes(&self) -> Vec<Arc<Route>>;
}

/// Source of route definitions.
///
/// Implementations re-read their backing source on every call.
#[async_trait]
pub trait RouteDefinitionLocator: Send + Sync {
    async fn route_definitions(&self) -> Vec<RouteDefinition>;
}

#[async_trait]
impl RouteLocator for Vec<Arc<Route>> {
    async fn routes(&self) -> Vec<Arc<Route>> {
        self.clone()
    }
}

#[async_trait]
impl RouteDefinitionLocator for Vec<RouteDefinition> {
    async fn route_definitions(&self) -> Vec<RouteDefinition> {
        self.clone()
    }
}
