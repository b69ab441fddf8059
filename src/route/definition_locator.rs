//! Route compiler: `RouteDefinition` → `Route`.
//!
//! # Responsibilities
//! - Resolve every predicate and filter definition against the factory
//!   registries and bind its arguments
//! - AND the predicates in declaration order
//! - Number, merge and stable-sort default filters and route filters
//!
//! # Design Decisions
//! - A definition that fails to compile is logged and dropped; the rest of
//!   the table is unaffected
//! - Filters without an explicit order are numbered by position within their
//!   own list, starting at 1, so default filters and route filters with the
//!   same position tie and keep default-first order
//! - Default filters are read from the live config on every compilation

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, error, info};

use super::{Route, RouteDefinitionLocator, RouteLocator};
use crate::config::GatewayConfig;
use crate::definition::{FilterDefinition, RouteDefinition};
use crate::error::CompileError;
use crate::event::{EventBus, GatewayEvent};
use crate::filter::factory::FilterRegistry;
use crate::filter::{sort_filters, OrderedFilter};
use crate::handler::predicate::{AndPredicate, PredicateRegistry, RoutePredicate};
use crate::observability::metrics;
use crate::support::EvaluationContext;

/// Compiles definitions from a `RouteDefinitionLocator` into routes.
pub struct RouteDefinitionRouteLocator {
    definitions: Arc<dyn RouteDefinitionLocator>,
    predicates: Arc<PredicateRegistry>,
    filters: Arc<FilterRegistry>,
    config: Arc<ArcSwap<GatewayConfig>>,
    events: Option<EventBus>,
    context: Option<Arc<dyn EvaluationContext + Send + Sync>>,
}

impl RouteDefinitionRouteLocator {
    pub fn new(
        definitions: Arc<dyn RouteDefinitionLocator>,
        predicates: Arc<PredicateRegistry>,
        filters: Arc<FilterRegistry>,
        config: Arc<ArcSwap<GatewayConfig>>,
    ) -> Self {
        Self {
            definitions,
            predicates,
            filters,
            config,
            events: None,
            context: None,
        }
    }

    /// Publish `PredicateArgs` / `FilterArgs` events after binding.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Evaluate `#{...}` argument values against `context`.
    pub fn with_evaluation_context(
        mut self,
        context: Arc<dyn EvaluationContext + Send + Sync>,
    ) -> Self {
        self.context = Some(context);
        self
    }

    /// Compile one definition.
    pub fn compile(
        &self,
        definition: &RouteDefinition,
        default_filters: &[FilterDefinition],
    ) -> Result<Route, CompileError> {
        let predicate = self.combine_predicates(definition)?;

        let mut filters = Vec::with_capacity(default_filters.len() + definition.filters.len());
        filters.extend(self.load_filters(&definition.id, default_filters)?);
        filters.extend(self.load_filters(&definition.id, &definition.filters)?);
        sort_filters(&mut filters);

        Ok(Route::new(
            definition.id.clone(),
            definition.uri.clone(),
            definition.order,
            predicate,
            filters,
        ))
    }

    fn combine_predicates(
        &self,
        definition: &RouteDefinition,
    ) -> Result<Arc<dyn RoutePredicate>, CompileError> {
        let route_id = &definition.id;
        if definition.predicates.is_empty() {
            return Err(CompileError::NoPredicates(route_id.clone()));
        }

        let mut predicates = Vec::with_capacity(definition.predicates.len());
        for predicate in &definition.predicates {
            let factory = self.predicates.get(&predicate.name).ok_or_else(|| {
                CompileError::UnknownPredicateFactory {
                    route_id: route_id.clone(),
                    name: predicate.name.clone(),
                }
            })?;

            let bound = factory
                .create(&predicate.args, self.context_ref())
                .map_err(|e| e.into_compile_error(route_id, &predicate.name))?;

            debug!(
                route_id = %route_id,
                predicate = %predicate.name,
                properties = ?bound.properties,
                "Bound predicate arguments"
            );
            self.publish(GatewayEvent::PredicateArgs {
                route_id: route_id.clone(),
                name: predicate.name.clone(),
                args: bound.properties,
            });
            predicates.push(bound.built);
        }

        if predicates.len() == 1 {
            return Ok(predicates.remove(0));
        }
        Ok(Arc::new(AndPredicate::new(predicates)))
    }

    fn load_filters(
        &self,
        route_id: &str,
        definitions: &[FilterDefinition],
    ) -> Result<Vec<OrderedFilter>, CompileError> {
        definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| {
                let factory = self.filters.get(&definition.name).ok_or_else(|| {
                    CompileError::UnknownFilterFactory {
                        route_id: route_id.to_string(),
                        name: definition.name.clone(),
                    }
                })?;

                let bound = factory
                    .create(&definition.args, self.context_ref())
                    .map_err(|e| e.into_compile_error(route_id, &definition.name))?;

                debug!(
                    route_id = %route_id,
                    filter = %definition.name,
                    properties = ?bound.properties,
                    "Bound filter arguments"
                );
                self.publish(GatewayEvent::FilterArgs {
                    route_id: route_id.to_string(),
                    name: definition.name.clone(),
                    args: bound.properties,
                });

                let order = definition.order.unwrap_or(position as i32 + 1);
                Ok(OrderedFilter::new(bound.built, order))
            })
            .collect()
    }

    fn context_ref(&self) -> Option<&dyn EvaluationContext> {
        self.context
            .as_deref()
            .map(|ctx| ctx as &dyn EvaluationContext)
    }

    fn publish(&self, event: GatewayEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

#[async_trait]
impl RouteLocator for RouteDefinitionRouteLocator {
    async fn routes(&self) -> Vec<Arc<Route>> {
        let definitions = self.definitions.route_definitions().await;
        let config = self.config.load();
        let default_filters = &config.gateway.default_filters;

        let mut routes = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            match self.compile(definition, default_filters) {
                Ok(route) => routes.push(Arc::new(route)),
                Err(e) => {
                    error!(route_id = %definition.id, error = %e, "Dropping route that failed to compile");
                    metrics::record_compile_failure(&definition.id);
                }
            }
        }

        info!(
            definitions = definitions.len(),
            compiled = routes.len(),
            "Compiled route definitions"
        );
        metrics::record_routes_compiled(routes.len());
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::PredicateDefinition;
    use crate::handler::predicate::test_support::get;
    use url::Url;

    fn locator(definitions: Vec<RouteDefinition>, config: GatewayConfig) -> RouteDefinitionRouteLocator {
        RouteDefinitionRouteLocator::new(
            Arc::new(definitions),
            Arc::new(PredicateRegistry::with_defaults()),
            Arc::new(FilterRegistry::with_defaults()),
            Arc::new(ArcSwap::from_pointee(config)),
        )
    }

    fn definition(id: &str, predicate: &str) -> RouteDefinition {
        RouteDefinition::new(id, Url::parse("http://localhost:9000").unwrap())
            .predicate(predicate.parse().unwrap())
    }

    #[tokio::test]
    async fn compiles_predicates_with_and_semantics() {
        let def = definition("r1", "Path=/get").predicate("Method=POST".parse().unwrap());
        let route = locator(vec![], GatewayConfig::default())
            .compile(&def, &[])
            .unwrap();

        assert!(!route.predicate().test(&mut get("/get")).await.unwrap());
    }

    #[test]
    fn filters_are_numbered_per_list_and_stably_sorted() {
        let def = definition("r1", "Path=/**")
            .filter("AddRequestHeader=X-A,1".parse().unwrap())
            .filter("PrefixPath=/p".parse().unwrap())
            .filter(FilterDefinition::new("SetStatus").with_arg("status", "201").with_order(-1));
        let defaults: Vec<FilterDefinition> = vec!["AddResponseHeader=X-G,1".parse().unwrap()];

        let route = locator(vec![], GatewayConfig::default())
            .compile(&def, &defaults)
            .unwrap();

        let names: Vec<(&str, i32)> = route
            .filters()
            .iter()
            .map(|f| (f.name(), f.order()))
            .collect();
        assert_eq!(
            names,
            [
                ("SetStatus", -1),
                ("AddResponseHeader", 1),
                ("AddRequestHeader", 1),
                ("PrefixPath", 2),
            ]
        );
    }

    #[test]
    fn compile_errors_name_the_route() {
        let loc = locator(vec![], GatewayConfig::default());

        let err = loc.compile(&definition("r1", "Nope=1"), &[]).unwrap_err();
        assert!(matches!(err, CompileError::UnknownPredicateFactory { ref name, .. } if name == "Nope"));

        let no_predicates = RouteDefinition::new("r2", Url::parse("http://x").unwrap());
        assert!(matches!(
            loc.compile(&no_predicates, &[]).unwrap_err(),
            CompileError::NoPredicates(_)
        ));

        let bad_filter = definition("r3", "Path=/").filter("Missing".parse().unwrap());
        assert!(matches!(
            loc.compile(&bad_filter, &[]).unwrap_err(),
            CompileError::UnknownFilterFactory { .. }
        ));

        let bad_regex = definition("r4", "Cookie=session,(");
        assert!(matches!(
            loc.compile(&bad_regex, &[]).unwrap_err(),
            CompileError::InvalidConfig { .. }
        ));
    }

    #[tokio::test]
    async fn failing_definitions_do_not_affect_the_rest() {
        let loc = locator(
            vec![
                definition("good-1", "Path=/a"),
                definition("broken", "Unknown=x"),
                definition("good-2", "Path=/b"),
            ],
            GatewayConfig::default(),
        );

        let ids: Vec<String> = loc.routes().await.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, ["good-1", "good-2"]);
    }

    #[tokio::test]
    async fn default_filters_come_from_live_config() {
        let mut config = GatewayConfig::default();
        config.gateway.default_filters = vec!["RemoveRequestHeader=Cookie".parse().unwrap()];
        let loc = locator(vec![definition("r1", "Path=/")], config);

        let routes = loc.routes().await;
        assert_eq!(routes[0].filters()[0].name(), "RemoveRequestHeader");
    }

    #[tokio::test]
    async fn publishes_binding_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let loc = locator(vec![], GatewayConfig::default()).with_events(bus);

        let def = RouteDefinition::new("r1", Url::parse("http://x").unwrap())
            .predicate(PredicateDefinition::new("Path").with_arg("pattern", "/x"));
        loc.compile(&def, &[]).unwrap();

        match rx.recv().await.unwrap() {
            GatewayEvent::PredicateArgs { route_id, name, .. } => {
                assert_eq!(route_id, "r1");
                assert_eq!(name, "Path");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    struct Service;

    impl EvaluationContext for Service {
        fn properties(&self) -> Vec<(String, String)> {
            vec![("serviceId".into(), "orders".into())]
        }
    }

    #[tokio::test]
    async fn binding_events_carry_normalised_properties() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let loc = locator(vec![], GatewayConfig::default())
            .with_events(bus)
            .with_evaluation_context(Arc::new(Service));

        let def = definition("r1", "Cookie=session,abc").filter(
            FilterDefinition::new("AddRequestHeader")
                .with_arg("name", "X-Svc")
                .with_arg("value", "#{serviceId}"),
        );
        loc.compile(&def, &[]).unwrap();

        match rx.recv().await.unwrap() {
            GatewayEvent::PredicateArgs { args, .. } => {
                assert_eq!(args.get("name").map(String::as_str), Some("session"));
                assert_eq!(args.get("regexp").map(String::as_str), Some("abc"));
                assert!(args.keys().all(|k| !k.starts_with("_genkey_")));
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.recv().await.unwrap() {
            GatewayEvent::FilterArgs { args, .. } => {
                assert_eq!(args.get("value").map(String::as_str), Some("orders"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
