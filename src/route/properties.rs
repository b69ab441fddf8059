//! Definitions from the `[gateway]` config section.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

use super::RouteDefinitionLocator;
use crate::config::GatewayConfig;
use crate::definition::RouteDefinition;

/// Reads `gateway.routes` from the live config on every call, so a reloaded
/// config shows up on the next refresh.
pub struct PropertiesRouteDefinitionLocator {
    config: Arc<ArcSwap<GatewayConfig>>,
}

impl PropertiesRouteDefinitionLocator {
    pub fn new(config: Arc<ArcSwap<GatewayConfig>>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RouteDefinitionLocator for PropertiesRouteDefinitionLocator {
    async fn route_definitions(&self) -> Vec<RouteDefinition> {
        self.config.load().gateway.routes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn follows_config_swaps() {
        let config = Arc::new(ArcSwap::from_pointee(GatewayConfig::default()));
        let locator = PropertiesRouteDefinitionLocator::new(config.clone());
        assert!(locator.route_definitions().await.is_empty());

        let mut next = GatewayConfig::default();
        next.gateway.routes = vec![RouteDefinition::new("r1", Url::parse("http://x").unwrap())];
        config.store(Arc::new(next));

        assert_eq!(locator.route_definitions().await[0].id, "r1");
    }
}
