//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, concurrency limit)
//!     → RoutePredicateHandlerMapping (404 when nothing matches)
//!     → FilteringWebHandler (route filters + global filters)
//!     → HttpRoutingFilter / ForwardRoutingFilter
//!     → ServerExchange.response → client
//! ```

pub mod server;

pub use server::{AppState, GatewayServer};
