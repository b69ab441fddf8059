//! Request handling: route matching and filter chain execution.
//!
//! # Data Flow
//! ```text
//! Request
//!     → RoutePredicateHandlerMapping (first route whose predicate holds)
//!     → FilteringWebHandler (global filters + route filters, sorted)
//!     → GatewayFilterChain (index-addressed continuation)
//!     → ServerExchange.response
//! ```

pub mod filtering;
pub mod mapping;
pub mod predicate;

pub use filtering::{FilteringWebHandler, GatewayFilterChain};
pub use mapping::{MatchOutcome, RoutePredicateHandlerMapping};
pub use predicate::{PredicateFactory, PredicateRegistry, RoutePredicate};
