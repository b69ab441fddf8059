//! Route Gateway Library
//!
//! Predicate-routed API gateway: route definitions are compiled into routes,
//! the first route whose predicate matches a request wins, and the request
//! runs through the route's filters plus the global infrastructure filters.

// Definitions and compilation
pub mod binding;
pub mod definition;
pub mod route;
pub mod support;

// Request handling
pub mod exchange;
pub mod filter;
pub mod handler;
pub mod http;

// Traffic management
pub mod discovery;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
