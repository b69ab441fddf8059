//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! lb://service-id route matched
//!     → LoadBalancerClientFilter asks a LoadBalancerClient to choose
//!     → client.rs (instances from the DiscoveryClient)
//!     → round_robin.rs (rotate through instances)
//!     → ServiceInstance or None (→ 404)
//! ```
//!
//! # Design Decisions
//! - Selection is behind the `LoadBalancerClient` trait; the filter only
//!   consumes the chosen instance
//! - One rotation counter per service id

pub mod client;
pub mod round_robin;

pub use client::DiscoveryLoadBalancerClient;
pub use round_robin::RoundRobin;

use async_trait::async_trait;

use crate::discovery::ServiceInstance;

/// Chooses a concrete instance for a logical service id.
#[async_trait]
pub trait LoadBalancerClient: Send + Sync {
    async fn choose(&self, service_id: &str) -> Option<ServiceInstance>;
}
