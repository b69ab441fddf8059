//! Route definitions.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{FilterDefinition, PredicateDefinition};

/// Uncompiled description of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route id. Generated when the source does not supply one.
    #[serde(default = "generate_route_id")]
    pub id: String,

    /// Target URI. May use a logical scheme (`lb://service`, `forward:/path`,
    /// `lb:ws://service`).
    pub uri: Url,

    /// Lower values are matched first.
    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub predicates: Vec<PredicateDefinition>,

    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

fn generate_route_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>, uri: Url) -> Self {
        Self {
            id: id.into(),
            uri,
            order: 0,
            predicates: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Definition with a random id.
    pub fn with_random_id(uri: Url) -> Self {
        Self::new(generate_route_id(), uri)
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn predicate(mut self, predicate: PredicateDefinition) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }
}
