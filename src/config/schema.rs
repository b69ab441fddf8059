//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::definition::{FilterDefinition, PredicateDefinition, RouteDefinition};
use crate::discovery::ServiceInstance;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Route definitions and filters applied to every route.
    pub gateway: GatewayProperties,

    /// Routes derived from discovered services.
    pub discovery: DiscoveryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrently processed requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Statically configured routes.
///
/// ```toml
/// [gateway]
/// default_filters = ["AddResponseHeader=X-Gateway, route-gateway"]
///
/// [[gateway.routes]]
/// id = "httpbin"
/// uri = "http://httpbin.org:80"
/// predicates = ["Path=/get"]
/// filters = [{ name = "AddRequestHeader", args = { name = "X-Foo", value = "bar" } }]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayProperties {
    pub routes: Vec<RouteDefinition>,

    /// Filters prepended to every route's own filters.
    pub default_filters: Vec<FilterDefinition>,
}

/// Discovery-derived routes.
///
/// Argument values of `predicates` and `filters` are expressions evaluated
/// against each service instance (see `support::expression`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Create routes for discovered services.
    pub enabled: bool,

    /// Route id prefix; defaults to the discovery client's description + `_`.
    pub route_id_prefix: Option<String>,

    /// Only services for which this evaluates to `true` get a route.
    pub include_expression: String,

    /// Route URI for a service.
    pub url_expression: String,

    /// Lower-case service ids in predicates and filters.
    pub lower_case_service_id: bool,

    pub predicates: Vec<PredicateDefinition>,

    pub filters: Vec<FilterDefinition>,

    /// Instances served by the built-in discovery client.
    pub services: Vec<ServiceInstance>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            route_id_prefix: None,
            include_expression: "true".to_string(),
            url_expression: "'lb://'+serviceId".to_string(),
            lower_case_service_id: false,
            predicates: vec![
                PredicateDefinition::new("Path").with_arg("pattern", "'/'+serviceId+'/**'")
            ],
            filters: vec![FilterDefinition::new("RewritePath")
                .with_arg("regexp", "'/' + serviceId + '/(?<remaining>.*)'")
                .with_arg("replacement", "'/${remaining}'")],
            services: Vec::new(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle pooled upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder admin key; validation rejects it when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
