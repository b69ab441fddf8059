//! Network forwarding for `http` and `https` request URLs.
//!
//! # Responsibilities
//! - Send the request to the resolved upstream URL
//! - Copy the upstream status, headers and body into the exchange response
//!
//! # Design Decisions
//! - Hop-by-hop headers (and anything the client listed in `Connection`)
//!   are not forwarded in either direction; `Host` is derived from the
//!   upstream URL
//! - Upstream headers are appended, so headers added by filters that ran
//!   earlier survive
//! - The outbound call runs inside the request task; dropping the task
//!   drops the in-flight connection
//! - TLS upstreams need a TLS-capable connector; the default connector
//!   speaks plain HTTP only

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, trace};

use super::{GatewayFilter, ROUTING_FILTER_ORDER};
use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copy `source` into `target`, skipping hop-by-hop headers and `Host`.
fn copy_headers(source: &HeaderMap, target: &mut HeaderMap) {
    let listed: Vec<HeaderName> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for (name, value) in source {
        if name == header::HOST || is_hop_by_hop(name) || listed.contains(name) {
            continue;
        }
        target.append(name.clone(), value.clone());
    }
}

#[derive(Clone)]
pub struct HttpRoutingFilter {
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
}

impl HttpRoutingFilter {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.enforce_http(false);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self {
            client,
            response_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }
}

#[async_trait]
impl GatewayFilter for HttpRoutingFilter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let url = match &exchange.attributes.request_url {
            Some(url) if matches!(url.scheme(), "http" | "https") => url.clone(),
            _ => return chain.proceed(exchange).await,
        };
        if exchange.is_already_routed() {
            return chain.proceed(exchange).await;
        }
        exchange.set_already_routed();

        let upstream_error = |reason: String| GatewayError::Upstream {
            url: url.to_string(),
            reason,
        };

        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| GatewayError::InvalidRequestUrl {
                url: url.to_string(),
                reason: format!("{e}"),
            })?;

        let mut outbound = Request::builder()
            .method(exchange.request.method().clone())
            .uri(uri)
            .body(std::mem::take(exchange.request.body_mut()))
            .map_err(|e| upstream_error(e.to_string()))?;
        copy_headers(exchange.request.headers(), outbound.headers_mut());

        trace!(url = %url, method = %outbound.method(), "Forwarding request upstream");
        let response = tokio::time::timeout(self.response_timeout, self.client.request(outbound))
            .await
            .map_err(|_| GatewayError::UpstreamTimeout {
                url: url.to_string(),
                secs: self.response_timeout.as_secs(),
            })?
            .map_err(|e| upstream_error(e.to_string()))?;

        let (parts, body) = response.into_parts();
        debug!(url = %url, status = %parts.status, "Upstream responded");

        *exchange.response.status_mut() = parts.status;
        copy_headers(&parts.headers, exchange.response.headers_mut());
        *exchange.response.body_mut() = Body::new(body);

        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "HttpRouting"
    }

    fn order(&self) -> Option<i32> {
        Some(ROUTING_FILTER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::OrderedFilter;
    use crate::handler::predicate::test_support::get;
    use axum::http::HeaderValue;
    use url::Url;

    #[test]
    fn strips_hop_by_hop_and_listed_headers() {
        let mut source = HeaderMap::new();
        source.insert(header::HOST, HeaderValue::from_static("gateway"));
        source.insert(header::CONNECTION, HeaderValue::from_static("close, x-private"));
        source.insert("x-private", HeaderValue::from_static("1"));
        source.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        source.append("x-keep", HeaderValue::from_static("a"));
        source.append("x-keep", HeaderValue::from_static("b"));

        let mut target = HeaderMap::new();
        copy_headers(&source, &mut target);

        assert_eq!(target.len(), 2);
        assert_eq!(target.get_all("x-keep").iter().count(), 2);
    }

    #[tokio::test]
    async fn leaves_other_schemes_alone() {
        let filter = HttpRoutingFilter::new(&TimeoutConfig::default());
        let mut ex = get("/");
        ex.attributes.request_url = Some(Url::parse("forward:/local").unwrap());

        filter
            .filter(&mut ex, GatewayFilterChain::new(Vec::<OrderedFilter>::new().into()))
            .await
            .unwrap();
        assert!(!ex.is_already_routed());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let filter = HttpRoutingFilter::new(&TimeoutConfig::default());
        let mut ex = get("/");
        ex.attributes.request_url = Some(Url::parse("http://127.0.0.1:1/").unwrap());

        let err = filter
            .filter(&mut ex, GatewayFilterChain::new(Vec::<OrderedFilter>::new().into()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
