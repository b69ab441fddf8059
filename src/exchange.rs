//! Per-request state shared by the matcher and the filter chain.
//!
//! # Responsibilities
//! - Own the inbound request and the response being built for it
//! - Carry the request-scoped attributes: matched route, resolved target URL,
//!   side-scheme marker, "already routed" flag
//!
//! # Design Decisions
//! - Attributes are typed fields rather than a string-keyed map; the well-known
//!   keys are fixed and every consumer is in this crate
//! - `extensions` is the escape hatch for custom filters
//! - The exchange is owned by exactly one request task, so nothing here is
//!   synchronised

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Extensions, Request, Response, Uri};
use url::Url;

use crate::error::GatewayError;
use crate::route::Route;

/// Request-scoped attributes.
#[derive(Debug, Default)]
pub struct ExchangeAttributes {
    /// The route selected by the matcher.
    pub route: Option<Arc<Route>>,

    /// Id of the route whose predicate is currently being evaluated.
    pub predicate_route_id: Option<String>,

    /// Effective upstream URL, set by `RouteToRequestUrlFilter` and rewritten
    /// by the load balancer.
    pub request_url: Option<Url>,

    /// Every value `request_url` held before a rewrite, oldest first.
    pub original_request_urls: Vec<Url>,

    /// Outer scheme of a `scheme:inner-uri` route URI (`lb` in `lb:ws://svc`).
    pub scheme_prefix: Option<String>,

    /// Set by the routing filter that dispatched the request.
    pub already_routed: bool,

    /// Variables captured by `Path` and `Host` patterns.
    pub uri_template_variables: HashMap<String, String>,

    pub extensions: Extensions,
}

/// A request travelling through the gateway.
#[derive(Debug)]
pub struct ServerExchange {
    pub request: Request<Body>,
    pub response: Response<Body>,
    pub attributes: ExchangeAttributes,
}

impl ServerExchange {
    pub fn new(request: Request<Body>) -> Self {
        Self {
            request,
            response: Response::new(Body::empty()),
            attributes: ExchangeAttributes::default(),
        }
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.attributes.route.as_ref()
    }

    pub fn is_already_routed(&self) -> bool {
        self.attributes.already_routed
    }

    pub fn set_already_routed(&mut self) {
        self.attributes.already_routed = true;
    }

    /// Replace `request_url`, remembering the previous value.
    pub fn rewrite_request_url(&mut self, url: Url) {
        if let Some(previous) = self.attributes.request_url.replace(url) {
            self.attributes.original_request_urls.push(previous);
        }
    }

    /// Replace the request path, keeping the query string.
    pub fn set_request_path(&mut self, path: &str) -> Result<(), GatewayError> {
        let path_and_query = match self.request.uri().query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        self.set_request_path_and_query(&path_and_query)
    }

    /// Replace the query string, keeping the path.
    pub fn set_request_query(&mut self, query: Option<&str>) -> Result<(), GatewayError> {
        let path = self.request.uri().path().to_string();
        let path_and_query = match query {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path,
        };
        self.set_request_path_and_query(&path_and_query)
    }

    fn set_request_path_and_query(&mut self, path_and_query: &str) -> Result<(), GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidRequestUrl {
            url: path_and_query.to_string(),
            reason,
        };

        let mut parts = self.request.uri().clone().into_parts();
        parts.path_and_query = Some(path_and_query.parse().map_err(|e| invalid(format!("{e}")))?);
        *self.request.uri_mut() = Uri::from_parts(parts).map_err(|e| invalid(format!("{e}")))?;
        Ok(())
    }

    pub fn into_response(self) -> Response<Body> {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(uri: &str) -> ServerExchange {
        ServerExchange::new(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[test]
    fn path_rewrite_keeps_query() {
        let mut ex = exchange("/get?foo=bar");
        ex.set_request_path("/httpbin/get").unwrap();
        assert_eq!(ex.request.uri().path(), "/httpbin/get");
        assert_eq!(ex.request.uri().query(), Some("foo=bar"));
    }

    #[test]
    fn query_rewrite_keeps_path() {
        let mut ex = exchange("/get");
        ex.set_request_query(Some("a=1")).unwrap();
        assert_eq!(ex.request.uri().to_string(), "/get?a=1");
        ex.set_request_query(None).unwrap();
        assert_eq!(ex.request.uri().to_string(), "/get");
    }

    #[test]
    fn rewrite_request_url_tracks_history() {
        let mut ex = exchange("/");
        ex.rewrite_request_url(Url::parse("lb://svc/").unwrap());
        ex.rewrite_request_url(Url::parse("http://10.0.0.1:8080/").unwrap());
        assert_eq!(ex.attributes.original_request_urls.len(), 1);
        assert_eq!(
            ex.attributes.request_url.as_ref().map(Url::as_str),
            Some("http://10.0.0.1:8080/")
        );
    }
}
