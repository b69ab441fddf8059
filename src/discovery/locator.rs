//! Route definitions derived from discovered services.
//!
//! # Responsibilities
//! - One `RouteDefinition` per service that has at least one instance
//! - Compute id, URI and arguments from the service's first instance
//!
//! # Design Decisions
//! - Every predicate and filter argument value is an expression
//! - `lower_case_service_id` affects argument evaluation only; the route id
//!   and URI keep the registry's spelling
//! - A service whose expressions fail is skipped with a warning

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use super::{DiscoveryClient, ServiceInstance};
use crate::config::{DiscoveryConfig, GatewayConfig};
use crate::definition::{Args, FilterDefinition, PredicateDefinition, RouteDefinition};
use crate::route::RouteDefinitionLocator;
use crate::support::expression::{self, Expression, ExpressionError};

pub struct DiscoveryClientRouteDefinitionLocator {
    client: Arc<dyn DiscoveryClient>,
    config: Arc<ArcSwap<GatewayConfig>>,
}

impl DiscoveryClientRouteDefinitionLocator {
    pub fn new(client: Arc<dyn DiscoveryClient>, config: Arc<ArcSwap<GatewayConfig>>) -> Self {
        Self { client, config }
    }

    fn route_id_prefix(&self, properties: &DiscoveryConfig) -> String {
        match &properties.route_id_prefix {
            Some(prefix) if !prefix.trim().is_empty() => prefix.clone(),
            _ => format!("{}_", self.client.description()),
        }
    }
}

fn include(filter: &Option<Expression>, instance: &ServiceInstance) -> bool {
    let Some(expr) = filter else {
        return true;
    };
    match expr.evaluate_bool(instance) {
        Ok(included) => included,
        Err(e) => {
            warn!(service_id = %instance.service_id, error = %e, "Include expression failed, skipping service");
            false
        }
    }
}

fn evaluate_args(args: &Args, instance: &ServiceInstance) -> Result<Args, ExpressionError> {
    args.iter()
        .map(|(key, value)| Ok((key.clone(), expression::evaluate(value, instance)?)))
        .collect()
}

fn definition_for(
    id: String,
    instance: &ServiceInstance,
    properties: &DiscoveryConfig,
) -> Result<RouteDefinition, String> {
    let uri = expression::evaluate(&properties.url_expression, instance)
        .map_err(|e| e.to_string())?;
    let uri = Url::parse(&uri).map_err(|e| format!("invalid uri '{uri}': {e}"))?;

    let mut for_args = instance.clone();
    if properties.lower_case_service_id {
        for_args.service_id = for_args.service_id.to_lowercase();
    }

    let mut definition = RouteDefinition::new(id, uri);
    for original in &properties.predicates {
        let mut predicate = PredicateDefinition::new(original.name.clone());
        predicate.args = evaluate_args(&original.args, &for_args).map_err(|e| e.to_string())?;
        definition.predicates.push(predicate);
    }
    for original in &properties.filters {
        let mut filter = FilterDefinition::new(original.name.clone());
        filter.args = evaluate_args(&original.args, &for_args).map_err(|e| e.to_string())?;
        filter.order = original.order;
        definition.filters.push(filter);
    }
    Ok(definition)
}

#[async_trait]
impl RouteDefinitionLocator for DiscoveryClientRouteDefinitionLocator {
    async fn route_definitions(&self) -> Vec<RouteDefinition> {
        let config = self.config.load_full();
        let properties = &config.discovery;
        if !properties.enabled {
            return Vec::new();
        }

        let include_filter = if properties.include_expression.trim().eq_ignore_ascii_case("true") {
            None
        } else {
            match Expression::parse(&properties.include_expression) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    warn!(error = %e, "Invalid discovery include expression, no services included");
                    return Vec::new();
                }
            }
        };

        let prefix = self.route_id_prefix(properties);
        let mut definitions = Vec::new();
        for service_id in self.client.services().await {
            let Some(instance) = self.client.instances(&service_id).await.into_iter().next() else {
                continue;
            };
            if !include(&include_filter, &instance) {
                debug!(service_id = %service_id, "Service excluded from discovery routes");
                continue;
            }

            let id = format!("{prefix}{}", instance.service_id);
            match definition_for(id, &instance, properties) {
                Ok(definition) => definitions.push(definition),
                Err(reason) => {
                    warn!(service_id = %service_id, reason = %reason, "Unable to derive route for service");
                }
            }
        }
        definitions
    }
}
