//! Local dispatch for `forward:` request URLs.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Uri};
use axum::Router;
use tower::ServiceExt;
use tracing::trace;

use super::{GatewayFilter, ROUTING_FILTER_ORDER};
use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;

/// Hands `forward:/path` requests to an in-process axum router.
///
/// The local handler's response is final; the rest of the chain is not run.
/// Headers earlier filters already put on the response are kept, followed by
/// the local handler's own.
#[derive(Clone)]
pub struct ForwardRoutingFilter {
    local: Router,
}

impl ForwardRoutingFilter {
    pub fn new(local: Router) -> Self {
        Self { local }
    }
}

#[async_trait]
impl GatewayFilter for ForwardRoutingFilter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let url = match &exchange.attributes.request_url {
            Some(url) if url.scheme() == "forward" => url.clone(),
            _ => return chain.proceed(exchange).await,
        };
        if exchange.is_already_routed() {
            return chain.proceed(exchange).await;
        }
        exchange.set_already_routed();

        let path_and_query = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let forward_error = |reason: String| GatewayError::Forward {
            path: path_and_query.clone(),
            reason,
        };
        let uri: Uri = path_and_query
            .parse()
            .map_err(|e| forward_error(format!("{e}")))?;

        let mut request = std::mem::replace(&mut exchange.request, Request::new(Body::empty()));
        *request.uri_mut() = uri;
        trace!(path = %path_and_query, "Forwarding to local handler");

        let response = self
            .local
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| forward_error(e.to_string()))?;

        let (parts, body) = response.into_parts();
        *exchange.response.status_mut() = parts.status;
        let headers = exchange.response.headers_mut();
        for (name, value) in &parts.headers {
            headers.append(name.clone(), value.clone());
        }
        *exchange.response.body_mut() = body;
        Ok(())
    }

    fn name(&self) -> &str {
        "ForwardRouting"
    }

    fn order(&self) -> Option<i32> {
        Some(ROUTING_FILTER_ORDER)
    }
}
