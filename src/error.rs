//! Gateway error taxonomy.
//!
//! # Design Decisions
//! - Compile-time failures (`CompileError`) are scoped to one route definition;
//!   the locator logs and drops that route, the rest of the table survives
//! - Predicate failures (`PredicateError`) never leave the matcher: they are
//!   logged and the route is treated as non-matching
//! - "No route matched" is not an error at all, it is an empty lookup result
//! - `GatewayError` is what reaches the top of a request's filter chain and is
//!   rendered to the client through `IntoResponse`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::support::expression::ExpressionError;

/// Failure to turn definition arguments into a factory configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// More positional arguments than the factory declares shortcut fields.
    #[error("{factory} accepts {declared} positional argument(s), got {given}")]
    TooManyArguments {
        factory: String,
        declared: usize,
        given: usize,
    },

    /// An explicit argument key that the configuration does not have.
    #[error("{factory} has no configuration field named '{field}'")]
    UnknownField { factory: String, field: String },

    /// The bound properties could not be decoded into the configuration.
    #[error("invalid configuration for {factory}: {reason}")]
    Invalid { factory: String, reason: String },

    /// An `#{...}` argument failed to evaluate.
    #[error("expression in argument '{key}' of {factory} failed: {source}")]
    Expression {
        factory: String,
        key: String,
        #[source]
        source: ExpressionError,
    },
}

/// Failure to compile one `RouteDefinition` into a `Route`.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("route '{route_id}': unable to find predicate factory with name '{name}'")]
    UnknownPredicateFactory { route_id: String, name: String },

    #[error("route '{route_id}': unable to find filter factory with name '{name}'")]
    UnknownFilterFactory { route_id: String, name: String },

    #[error("route '{0}' declares no predicates")]
    NoPredicates(String),

    #[error("route '{route_id}': {source}")]
    Binding {
        route_id: String,
        #[source]
        source: BindingError,
    },

    /// The configuration bound fine but the factory rejected it (bad regex,
    /// bad datetime, unknown HTTP method, ...).
    #[error("route '{route_id}': {factory} rejected its configuration: {reason}")]
    InvalidConfig {
        route_id: String,
        factory: String,
        reason: String,
    },
}

/// A factory rejecting an otherwise well-formed configuration.
///
/// Factories return this from `apply`; the compiler attaches the route id and
/// turns it into `CompileError::InvalidConfig`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FactoryError(pub String);

impl FactoryError {
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self(reason.to_string())
    }
}

/// Failure of a type-erased factory to produce a predicate or filter from
/// definition arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

impl ApplyError {
    /// Attach the route id and factory name for reporting.
    pub fn into_compile_error(self, route_id: &str, factory: &str) -> CompileError {
        match self {
            ApplyError::Binding(source) => CompileError::Binding {
                route_id: route_id.to_string(),
                source,
            },
            ApplyError::Factory(FactoryError(reason)) => CompileError::InvalidConfig {
                route_id: route_id.to_string(),
                factory: factory.to_string(),
                reason,
            },
        }
    }
}

/// A predicate that failed while evaluating a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("predicate '{predicate}' failed: {reason}")]
pub struct PredicateError {
    pub predicate: String,
    pub reason: String,
}

impl PredicateError {
    pub fn new(predicate: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            predicate: predicate.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while a request travels through the filter chain.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The load balancer found no instance for a logical service.
    #[error("unable to find instance for {service_id}")]
    NoInstanceAvailable { service_id: String },

    /// A load-balanced route URI without a usable host.
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// The resolved target could not be turned into an outbound URL.
    #[error("invalid request url '{url}': {reason}")]
    InvalidRequestUrl { url: String, reason: String },

    /// Network forwarding failed.
    #[error("upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("upstream request to {url} timed out after {secs}s")]
    UpstreamTimeout { url: String, secs: u64 },

    /// Local dispatch of a `forward:` route failed.
    #[error("forward to {path} failed: {reason}")]
    Forward { path: String, reason: String },

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoInstanceAvailable { .. } => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InvalidHost(_)
            | GatewayError::InvalidRequestUrl { .. }
            | GatewayError::Forward { .. }
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed in filter chain");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected in filter chain");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_instance_is_not_found() {
        let err = GatewayError::NoInstanceAvailable {
            service_id: "my-service".into(),
        };
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "unable to find instance for my-service");
    }

    #[test]
    fn upstream_failures_map_to_gateway_statuses() {
        let err = GatewayError::Upstream {
            url: "http://10.0.0.1/".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = GatewayError::UpstreamTimeout {
            url: "http://10.0.0.1/".into(),
            secs: 5,
        };
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
