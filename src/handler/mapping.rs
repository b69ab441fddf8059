//! Route matching.
//!
//! # Responsibilities
//! - Walk the cached route table in order and pick the first route whose
//!   predicate holds for the request
//! - Record the matched route on the exchange
//!
//! # Design Decisions
//! - A predicate that fails is logged and counts as "no match" for that
//!   route only; matching continues with the next route
//! - Variables captured by a route that did not match are discarded so they
//!   cannot leak into the matched route's filters
//! - No match is `None`, not an error; the server renders it as 404

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::exchange::ServerExchange;
use crate::route::{CachingRouteLocator, Route};

/// Result of testing one route against a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Match,
    NoMatch,
    /// The predicate raised an error; treated as `NoMatch`.
    Failed(String),
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Match)
    }
}

/// Maps a request to the first matching route.
#[derive(Clone)]
pub struct RoutePredicateHandlerMapping {
    routes: Arc<CachingRouteLocator>,
}

impl RoutePredicateHandlerMapping {
    pub fn new(routes: Arc<CachingRouteLocator>) -> Self {
        Self { routes }
    }

    /// Test a single route.
    pub async fn test(route: &Route, exchange: &mut ServerExchange) -> MatchOutcome {
        exchange.attributes.predicate_route_id = Some(route.id().to_string());

        let outcome = match route.predicate().test(exchange).await {
            Ok(true) => MatchOutcome::Match,
            Ok(false) => MatchOutcome::NoMatch,
            Err(e) => {
                error!(route_id = %route.id(), error = %e, "Error applying predicate for route");
                MatchOutcome::Failed(e.to_string())
            }
        };

        if !outcome.is_match() {
            exchange.attributes.uri_template_variables.clear();
        }
        outcome
    }

    /// Find the first matching route and store it on the exchange.
    pub async fn lookup_route(&self, exchange: &mut ServerExchange) -> Option<Arc<Route>> {
        let routes = self.routes.snapshot().await;

        for route in routes.iter() {
            let outcome = Self::test(route, exchange).await;
            trace!(route_id = %route.id(), outcome = ?outcome, "Tested route");
            if outcome.is_match() {
                debug!(
                    route_id = %route.id(),
                    method = %exchange.request.method(),
                    path = %exchange.request.uri().path(),
                    "Route matched"
                );
                exchange.attributes.route = Some(route.clone());
                return Some(route.clone());
            }
        }

        debug!(
            method = %exchange.request.method(),
            path = %exchange.request.uri().path(),
            "No route found"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredicateError;
    use crate::handler::predicate::test_support::get;
    use crate::handler::predicate::{FnPredicate, RoutePredicate};
    use crate::route::test_support::route;
    use crate::route::RouteLocator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn mapping(routes: Vec<Arc<Route>>) -> RoutePredicateHandlerMapping {
        RoutePredicateHandlerMapping::new(Arc::new(CachingRouteLocator::new(Arc::new(routes))))
    }

    struct Failing;

    #[async_trait]
    impl RoutePredicate for Failing {
        async fn test(&self, _: &mut ServerExchange) -> Result<bool, PredicateError> {
            Err(PredicateError::new("Failing", "boom"))
        }

        fn name(&self) -> &str {
            "Failing"
        }
    }

    fn with_predicate(id: &str, order: i32, predicate: Arc<dyn RoutePredicate>) -> Arc<Route> {
        Arc::new(Route::new(
            id,
            Url::parse("http://localhost").unwrap(),
            order,
            predicate,
            Vec::new(),
        ))
    }

    #[tokio::test]
    async fn lower_order_wins_when_both_match() {
        let mapping = mapping(vec![route("r2", 1, "/get"), route("r1", 0, "/get")]);
        let mut ex = get("/get");

        let matched = mapping.lookup_route(&mut ex).await.unwrap();
        assert_eq!(matched.id(), "r1");
        assert_eq!(ex.route().map(|r| r.id()), Some("r1"));
    }

    #[tokio::test]
    async fn failing_predicate_is_isolated() {
        let mapping = mapping(vec![
            with_predicate("broken", 0, Arc::new(Failing)),
            route("fallback", 1, "/x"),
        ]);
        let mut ex = get("/x");

        assert_eq!(mapping.lookup_route(&mut ex).await.unwrap().id(), "fallback");
    }

    #[tokio::test]
    async fn stops_at_first_match() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();
        let later = FnPredicate::arc("counting", move |_: &mut ServerExchange| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        let mapping = mapping(vec![route("first", 0, "/a"), with_predicate("later", 1, later)]);

        mapping.lookup_route(&mut get("/a")).await.unwrap();
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_match_is_none() {
        let mapping = mapping(vec![route("r1", 0, "/a")]);
        let mut ex = get("/b");
        assert!(mapping.lookup_route(&mut ex).await.is_none());
        assert!(ex.route().is_none());
        assert_eq!(ex.attributes.predicate_route_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn captured_variables_of_rejected_routes_are_dropped() {
        let capture = FnPredicate::arc("capture", |ex: &mut ServerExchange| {
            ex.attributes
                .uri_template_variables
                .insert("segment".into(), "leak".into());
            false
        });
        let mapping = mapping(vec![with_predicate("capture", 0, capture), route("r", 1, "/a")]);
        let mut ex = get("/a");

        mapping.lookup_route(&mut ex).await.unwrap();
        assert!(ex.attributes.uri_template_variables.is_empty());
    }

    #[tokio::test]
    async fn table_is_read_through_the_cache() {
        let routes: Arc<dyn RouteLocator> = Arc::new(vec![route("r1", 0, "/a")]);
        let cache = Arc::new(CachingRouteLocator::new(routes));
        let mapping = RoutePredicateHandlerMapping::new(cache.clone());

        assert!(mapping.lookup_route(&mut get("/a")).await.is_some());
        assert_eq!(cache.snapshot().await.len(), 1);
    }
}
