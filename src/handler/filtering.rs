//! Filter chain execution.
//!
//! # Responsibilities
//! - Merge the global filters with the matched route's filters and sort them
//!   by order for each request
//! - Run the sorted list as an index-addressed continuation chain
//!
//! # Design Decisions
//! - The chain is a shared, immutable `Arc<[OrderedFilter]>` plus a cursor;
//!   `proceed` hands filter *i* a chain positioned at *i + 1*
//! - An exhausted chain completes successfully with no further action
//! - The merge happens per request so relative order between a global filter
//!   and a route filter is decided only by their order values

use std::sync::Arc;

use tracing::trace;

use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::filter::{sort_filters, GatewayFilter, OrderedFilter};

/// The remainder of a request's filter chain.
#[derive(Clone)]
pub struct GatewayFilterChain {
    filters: Arc<[OrderedFilter]>,
    index: usize,
}

impl GatewayFilterChain {
    pub fn new(filters: Arc<[OrderedFilter]>) -> Self {
        Self { filters, index: 0 }
    }

    /// Run the next filter, handing it the chain positioned after itself.
    pub async fn proceed(self, exchange: &mut ServerExchange) -> Result<(), GatewayError> {
        let Some(current) = self.filters.get(self.index) else {
            return Ok(());
        };
        let filter = current.filter().clone();
        trace!(filter = %current.name(), order = current.order(), "Invoking filter");

        let next = Self {
            filters: self.filters.clone(),
            index: self.index + 1,
        };
        filter.filter(exchange, next).await
    }

    /// Filters not yet run, in execution order.
    pub fn remaining(&self) -> &[OrderedFilter] {
        self.filters.get(self.index..).unwrap_or_default()
    }
}

/// Runs the matched route through the global and route filters.
#[derive(Clone)]
pub struct FilteringWebHandler {
    global_filters: Arc<[OrderedFilter]>,
}

impl FilteringWebHandler {
    pub fn new(global_filters: Vec<Arc<dyn GatewayFilter>>) -> Self {
        let mut global: Vec<OrderedFilter> =
            global_filters.into_iter().map(OrderedFilter::global).collect();
        sort_filters(&mut global);
        Self {
            global_filters: global.into(),
        }
    }

    pub fn global_filters(&self) -> &[OrderedFilter] {
        &self.global_filters
    }

    /// Global filters followed by the route's filters, stable-sorted by order.
    pub fn combined_filters(&self, exchange: &ServerExchange) -> Vec<OrderedFilter> {
        let route_filters = exchange
            .route()
            .map(|route| route.filters())
            .unwrap_or_default();

        let mut combined = Vec::with_capacity(self.global_filters.len() + route_filters.len());
        combined.extend(self.global_filters.iter().cloned());
        combined.extend(route_filters.iter().cloned());
        sort_filters(&mut combined);
        combined
    }

    pub async fn handle(&self, exchange: &mut ServerExchange) -> Result<(), GatewayError> {
        let combined = self.combined_filters(exchange);
        trace!(
            filters = ?combined.iter().map(OrderedFilter::name).collect::<Vec<_>>(),
            "Sorted gateway filters"
        );
        GatewayFilterChain::new(combined.into()).proceed(exchange).await
    }
}
