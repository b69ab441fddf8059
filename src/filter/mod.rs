//! Gateway filters.
//!
//! # Responsibilities
//! - Define the `GatewayFilter` capability and its ordered wrapper
//! - Provide the global infrastructure filters that resolve and dispatch the
//!   matched route's target
//! - Host the named filter factories used by route definitions (`factory`)
//!
//! # Design Decisions
//! - A filter receives the rest of the chain as a value and decides whether
//!   and when to call `proceed`; work after `proceed` returns is response
//!   post-processing
//! - Global filters carry a fixed order; route filters get theirs from the
//!   route compiler
//!
//! # Global filter order
//! ```text
//! ForwardPathFilter            0
//! RouteToRequestUrlFilter      10000
//! LoadBalancerClientFilter     10100
//! HttpRoutingFilter            i32::MAX
//! ForwardRoutingFilter         i32::MAX
//! ```

pub mod factory;
pub mod forward_path;
pub mod forward_routing;
pub mod http_routing;
pub mod load_balancer;
pub mod route_to_request_url;

pub use forward_path::ForwardPathFilter;
pub use forward_routing::ForwardRoutingFilter;
pub use http_routing::HttpRoutingFilter;
pub use load_balancer::LoadBalancerClientFilter;
pub use route_to_request_url::RouteToRequestUrlFilter;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;

pub const FORWARD_PATH_FILTER_ORDER: i32 = 0;
pub const ROUTE_TO_URL_FILTER_ORDER: i32 = 10000;
pub const LOAD_BALANCER_CLIENT_FILTER_ORDER: i32 = 10100;
pub const ROUTING_FILTER_ORDER: i32 = i32::MAX;

/// One step of request processing.
#[async_trait]
pub trait GatewayFilter: Send + Sync {
    /// Process the exchange. Call `chain.proceed(exchange)` to continue, or
    /// return without calling it to end processing here.
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError>;

    fn name(&self) -> &str;

    /// Fixed position for filters that always run at the same point.
    fn order(&self) -> Option<i32> {
        None
    }
}

/// A filter paired with its execution order.
#[derive(Clone)]
pub struct OrderedFilter {
    filter: Arc<dyn GatewayFilter>,
    order: i32,
}

impl OrderedFilter {
    pub fn new(filter: Arc<dyn GatewayFilter>, order: i32) -> Self {
        Self { filter, order }
    }

    /// Wrap a filter using its own fixed order (0 when it declares none).
    pub fn global(filter: Arc<dyn GatewayFilter>) -> Self {
        let order = filter.order().unwrap_or(0);
        Self { filter, order }
    }

    pub fn filter(&self) -> &Arc<dyn GatewayFilter> {
        &self.filter
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn name(&self) -> &str {
        self.filter.name()
    }
}

impl fmt::Debug for OrderedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedFilter")
            .field("name", &self.filter.name())
            .field("order", &self.order)
            .finish()
    }
}

/// Stable sort by order: equal orders keep their relative position.
pub fn sort_filters(filters: &mut [OrderedFilter]) {
    filters.sort_by_key(OrderedFilter::order);
}

/// The built-in global filters.
pub fn default_global_filters(
    http: HttpRoutingFilter,
    load_balancer: LoadBalancerClientFilter,
    forward: ForwardRoutingFilter,
) -> Vec<Arc<dyn GatewayFilter>> {
    vec![
        Arc::new(ForwardPathFilter),
        Arc::new(RouteToRequestUrlFilter),
        Arc::new(load_balancer),
        Arc::new(http),
        Arc::new(forward),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl GatewayFilter for Named {
        async fn filter(
            &self,
            exchange: &mut ServerExchange,
            chain: GatewayFilterChain,
        ) -> Result<(), GatewayError> {
            chain.proceed(exchange).await
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn sorting_keeps_ties_in_declaration_order() {
        let mut filters = vec![
            OrderedFilter::new(Arc::new(Named("AddRequestHeader")), 1),
            OrderedFilter::new(Arc::new(Named("RouteToRequestUrl")), ROUTE_TO_URL_FILTER_ORDER),
            OrderedFilter::new(Arc::new(Named("PrefixPath")), 1),
            OrderedFilter::new(Arc::new(Named("First")), -5),
        ];
        sort_filters(&mut filters);

        let names: Vec<&str> = filters.iter().map(OrderedFilter::name).collect();
        assert_eq!(
            names,
            ["First", "AddRequestHeader", "PrefixPath", "RouteToRequestUrl"]
        );
    }
}
