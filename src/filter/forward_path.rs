//! For `forward:` routes, the route's path replaces the request path.

use async_trait::async_trait;

use super::{GatewayFilter, FORWARD_PATH_FILTER_ORDER};
use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;

pub struct ForwardPathFilter;

#[async_trait]
impl GatewayFilter for ForwardPathFilter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        if let Some(route) = exchange.route().cloned() {
            if route.uri().scheme() == "forward" && !exchange.is_already_routed() {
                exchange.set_request_path(route.uri().path())?;
            }
        }
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "ForwardPath"
    }

    fn order(&self) -> Option<i32> {
        Some(FORWARD_PATH_FILTER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OrderedFilter;
    use crate::handler::predicate::test_support::get;
    use crate::handler::predicate::FnPredicate;
    use crate::route::Route;
    use std::sync::Arc;
    use url::Url;

    #[tokio::test]
    async fn rewrites_path_for_forward_routes() {
        let mut ex = get("/original?q=1");
        ex.attributes.route = Some(Arc::new(Route::new(
            "fwd",
            Url::parse("forward:/local/health").unwrap(),
            0,
            FnPredicate::arc("any", |_: &mut ServerExchange| true),
            Vec::new(),
        )));

        ForwardPathFilter
            .filter(&mut ex, GatewayFilterChain::new(Vec::<OrderedFilter>::new().into()))
            .await
            .unwrap();
        assert_eq!(ex.request.uri().to_string(), "/local/health?q=1");
    }
}
