//! Resolves the matched route's URI into the effective request URL.
//!
//! The request URL keeps the inbound path and query and takes scheme, host
//! and port from the route URI. A route URI of the form `outer:inner-uri`
//! (`lb:ws://service`) records `outer` as the scheme prefix and continues
//! with `inner-uri`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::trace;
use url::Url;

use super::{GatewayFilter, ROUTE_TO_URL_FILTER_ORDER};
use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;

static SCHEME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]([a-zA-Z]|\d|\+|\.|-)*:.*$").expect("scheme pattern is valid")
});

/// `true` for URIs like `lb:ws://service`: no authority, and a body that is
/// itself a URI with a scheme.
pub fn has_another_scheme(uri: &Url) -> bool {
    uri.cannot_be_a_base() && uri.host().is_none() && SCHEME_PATTERN.is_match(uri.path())
}

/// Merge the route target's scheme, host and port with the inbound path and query.
pub fn merge_url(route_uri: &Url, path: &str, query: Option<&str>) -> Result<Url, GatewayError> {
    let mut merged = format!("{}:", route_uri.scheme());
    if let Some(host) = route_uri.host_str() {
        merged.push_str("//");
        merged.push_str(host);
        if let Some(port) = route_uri.port() {
            merged.push_str(&format!(":{port}"));
        }
    }
    merged.push_str(path);
    if let Some(query) = query {
        merged.push('?');
        merged.push_str(query);
    }

    Url::parse(&merged).map_err(|e| GatewayError::InvalidRequestUrl {
        url: merged.clone(),
        reason: e.to_string(),
    })
}

pub struct RouteToRequestUrlFilter;

#[async_trait]
impl GatewayFilter for RouteToRequestUrlFilter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let Some(route) = exchange.route().cloned() else {
            return chain.proceed(exchange).await;
        };

        let mut route_uri = route.uri().clone();
        if has_another_scheme(&route_uri) {
            exchange.attributes.scheme_prefix = Some(route_uri.scheme().to_string());
            route_uri = Url::parse(route_uri.path()).map_err(|e| GatewayError::InvalidRequestUrl {
                url: route.uri().to_string(),
                reason: e.to_string(),
            })?;
        }

        if route_uri.scheme().eq_ignore_ascii_case("lb") && route_uri.host().is_none() {
            return Err(GatewayError::InvalidHost(route_uri.to_string()));
        }

        let merged = merge_url(
            &route_uri,
            exchange.request.uri().path(),
            exchange.request.uri().query(),
        )?;
        trace!(route_id = %route.id(), url = %merged, "Resolved request url");
        exchange.attributes.request_url = Some(merged);

        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "RouteToRequestUrl"
    }

    fn order(&self) -> Option<i32> {
        Some(ROUTE_TO_URL_FILTER_ORDER)
    }
}
