//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the gateway: locators, cache, matcher, global filters
//! - Create the Axum router with the gateway handler as fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bound concurrently processed requests with a semaphore
//! - Apply reloaded configuration and publish route refreshes
//! - Serve the admin API on its own listener when enabled
//!
//! # Design Decisions
//! - Every path and method reaches the gateway handler; routing is entirely
//!   decided by route predicates
//! - A reloaded config is swapped in whole; the route table is rebuilt on the
//!   next request after the refresh event

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::discovery::{DiscoveryClientRouteDefinitionLocator, SimpleDiscoveryClient};
use crate::event::{spawn_refresh_listener, EventBus, GatewayEvent};
use crate::exchange::ServerExchange;
use crate::filter::factory::FilterRegistry;
use crate::filter::{
    default_global_filters, ForwardRoutingFilter, HttpRoutingFilter, LoadBalancerClientFilter,
};
use crate::handler::{FilteringWebHandler, PredicateRegistry, RoutePredicateHandlerMapping};
use crate::load_balancer::DiscoveryLoadBalancerClient;
use crate::observability::metrics;
use crate::route::{
    CachingRouteLocator, CompositeRouteDefinitionLocator, InMemoryRouteDefinitionRepository,
    PropertiesRouteDefinitionLocator, RouteDefinitionLocator, RouteDefinitionRouteLocator,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<GatewayConfig>>,
    pub events: EventBus,
    pub routes: Arc<CachingRouteLocator>,
    pub mapping: RoutePredicateHandlerMapping,
    pub handler: FilteringWebHandler,
    pub repository: Arc<InMemoryRouteDefinitionRepository>,
    pub discovery: Arc<SimpleDiscoveryClient>,
    /// Caps concurrently processed requests at `listener.max_connections`.
    pub in_flight: Arc<Semaphore>,
}

impl AppState {
    /// Swap in a reloaded configuration and invalidate the route table.
    pub fn apply_config(&self, config: GatewayConfig) {
        let current = self.config.load();
        if current.listener.bind_address != config.listener.bind_address {
            tracing::warn!(
                current = %current.listener.bind_address,
                requested = %config.listener.bind_address,
                "Listener address changes require a restart"
            );
        }

        self.discovery.replace(config.discovery.services.clone());
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
        self.events.publish(GatewayEvent::RefreshRoutes);
    }
}

/// Local handlers reachable through `forward:` routes.
pub fn local_router() -> Router {
    Router::new().route("/health", get(|| async { "OK" }))
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Create a gateway with the built-in factories and local handlers.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_components(
            config,
            PredicateRegistry::with_defaults(),
            FilterRegistry::with_defaults(),
            local_router(),
        )
    }

    /// Create a gateway with custom factory registries and `forward:` handlers.
    pub fn with_components(
        config: GatewayConfig,
        predicates: PredicateRegistry,
        filters: FilterRegistry,
        local: Router,
    ) -> Self {
        let events = EventBus::new();
        let discovery = Arc::new(SimpleDiscoveryClient::new(config.discovery.services.clone()));
        let repository = Arc::new(InMemoryRouteDefinitionRepository::new());

        let http = HttpRoutingFilter::new(&config.timeouts);
        let max_connections = config.listener.max_connections;
        let shared = Arc::new(ArcSwap::from_pointee(config));

        let definitions: Vec<Arc<dyn RouteDefinitionLocator>> = vec![
            Arc::new(PropertiesRouteDefinitionLocator::new(shared.clone())),
            Arc::new(DiscoveryClientRouteDefinitionLocator::new(
                discovery.clone(),
                shared.clone(),
            )),
            repository.clone(),
        ];
        let compiler = RouteDefinitionRouteLocator::new(
            Arc::new(CompositeRouteDefinitionLocator::new(definitions)),
            Arc::new(predicates),
            Arc::new(filters),
            shared.clone(),
        )
        .with_events(events.clone());
        let routes = Arc::new(CachingRouteLocator::new(Arc::new(compiler)));

        let load_balancer = LoadBalancerClientFilter::new(Arc::new(
            DiscoveryLoadBalancerClient::new(discovery.clone()),
        ));
        let handler = FilteringWebHandler::new(default_global_filters(
            http,
            load_balancer,
            ForwardRoutingFilter::new(local),
        ));

        let state = AppState {
            config: shared,
            events,
            mapping: RoutePredicateHandlerMapping::new(routes.clone()),
            routes,
            handler,
            repository,
            discovery,
            in_flight: Arc::new(Semaphore::new(max_connections)),
        };

        let router = Self::build_router(&state.config.load(), state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway server starting");

        spawn_refresh_listener(
            &self.state.events,
            self.state.routes.clone(),
            shutdown.resubscribe(),
        );

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reload_shutdown.recv() => break,
                    update = config_updates.recv() => match update {
                        Some(config) => reload_state.apply_config(config),
                        None => break,
                    },
                }
            }
        });

        let admin_config = self.state.config.load().admin.clone();
        if admin_config.enabled {
            let admin_listener = TcpListener::bind(&admin_config.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let admin_router = admin::setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API server failed");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Match a route and run the exchange through the filter chain.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Ok(_permit) = state.in_flight.acquire().await else {
        metrics::record_request(&method, 503, "none", start_time);
        return (StatusCode::SERVICE_UNAVAILABLE, "Gateway is shutting down").into_response();
    };

    let mut exchange = ServerExchange::new(request);
    let Some(route) = state.mapping.lookup_route(&mut exchange).await else {
        metrics::record_request(&method, 404, "none", start_time);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        route_id = %route.id(),
        "Handling request"
    );

    let response = match state.handler.handle(&mut exchange).await {
        Ok(()) => exchange.into_response(),
        Err(e) => e.into_response(),
    };
    metrics::record_request(&method, response.status().as_u16(), route.id(), start_time);
    response
}
