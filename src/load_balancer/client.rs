//! Load balancer over a `DiscoveryClient`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{LoadBalancerClient, RoundRobin};
use crate::discovery::{DiscoveryClient, ServiceInstance};

/// Round-robins over the instances the discovery client currently reports.
pub struct DiscoveryLoadBalancerClient {
    discovery: Arc<dyn DiscoveryClient>,
    rotations: DashMap<String, Arc<RoundRobin>>,
}

impl DiscoveryLoadBalancerClient {
    pub fn new(discovery: Arc<dyn DiscoveryClient>) -> Self {
        Self {
            discovery,
            rotations: DashMap::new(),
        }
    }
}

#[async_trait]
impl LoadBalancerClient for DiscoveryLoadBalancerClient {
    async fn choose(&self, service_id: &str) -> Option<ServiceInstance> {
        let instances = self.discovery.instances(service_id).await;
        if instances.is_empty() {
            debug!(service_id = %service_id, "No instances known for service");
            return None;
        }

        let rotation = self
            .rotations
            .entry(service_id.to_string())
            .or_default()
            .clone();
        rotation.next(&instances).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SimpleDiscoveryClient;

    #[tokio::test]
    async fn rotates_per_service() {
        let discovery = Arc::new(SimpleDiscoveryClient::new([
            ServiceInstance::new("a", "h1", 1),
            ServiceInstance::new("a", "h2", 2),
            ServiceInstance::new("b", "h3", 3),
        ]));
        let lb = DiscoveryLoadBalancerClient::new(discovery);

        assert_eq!(lb.choose("a").await.unwrap().port, 1);
        assert_eq!(lb.choose("b").await.unwrap().port, 3);
        assert_eq!(lb.choose("a").await.unwrap().port, 2);
        assert!(lb.choose("missing").await.is_none());
    }
}
