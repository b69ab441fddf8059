//! Service discovery.
//!
//! # Responsibilities
//! - Model discovered service instances
//! - Provide the `DiscoveryClient` seam and a config-backed implementation
//! - Derive route definitions from discovered services (`locator.rs`)
//!
//! # Data Flow
//! ```text
//! config [[discovery.services]] → SimpleDiscoveryClient
//!     → DiscoveryClientRouteDefinitionLocator → RouteDefinition per service
//!     → DiscoveryLoadBalancerClient (lb:// resolution at request time)
//! ```
//!
//! # Design Decisions
//! - The client is a trait so registries with real polling can be plugged in
//! - `SimpleDiscoveryClient` swaps its whole instance map on config reload;
//!   readers see either the old or the new map, never a mix

pub mod locator;

pub use locator::DiscoveryClientRouteDefinitionLocator;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::support::EvaluationContext;

/// One reachable instance of a logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,

    #[serde(default)]
    pub secure: bool,

    /// Explicit scheme; when absent it follows `secure`.
    #[serde(default)]
    pub scheme: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_id: service_id.into(),
            host: host.into(),
            port,
            secure: false,
            scheme: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `scheme` if set, otherwise `https` or `http` according to `secure`.
    pub fn effective_scheme(&self) -> &str {
        match &self.scheme {
            Some(scheme) => scheme,
            None if self.secure => "https",
            None => "http",
        }
    }

    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.effective_scheme(), self.host, self.port)
    }
}

impl EvaluationContext for ServiceInstance {
    fn properties(&self) -> Vec<(String, String)> {
        vec![
            ("serviceId".into(), self.service_id.clone()),
            ("host".into(), self.host.clone()),
            ("port".into(), self.port.to_string()),
            ("secure".into(), self.secure.to_string()),
            ("scheme".into(), self.scheme.clone().unwrap_or_default()),
            ("uri".into(), self.uri()),
        ]
    }

    fn metadata(&self) -> HashMap<String, String> {
        self.metadata.clone()
    }
}

/// Source of services and their instances.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Human-readable name; the default discovery route id prefix is derived from it.
    fn description(&self) -> &str;

    /// Known service ids.
    async fn services(&self) -> Vec<String>;

    /// Instances of `service_id`, empty when unknown.
    async fn instances(&self, service_id: &str) -> Vec<ServiceInstance>;
}

/// Discovery client over a fixed set of instances.
#[derive(Debug)]
pub struct SimpleDiscoveryClient {
    instances: ArcSwap<HashMap<String, Vec<ServiceInstance>>>,
}

impl SimpleDiscoveryClient {
    pub fn new(instances: impl IntoIterator<Item = ServiceInstance>) -> Self {
        Self {
            instances: ArcSwap::from_pointee(group(instances)),
        }
    }

    /// Replace every known instance in one swap.
    pub fn replace(&self, instances: impl IntoIterator<Item = ServiceInstance>) {
        self.instances.store(Arc::new(group(instances)));
    }
}

fn group(instances: impl IntoIterator<Item = ServiceInstance>) -> HashMap<String, Vec<ServiceInstance>> {
    let mut grouped: HashMap<String, Vec<ServiceInstance>> = HashMap::new();
    for instance in instances {
        grouped
            .entry(instance.service_id.clone())
            .or_default()
            .push(instance);
    }
    grouped
}

#[async_trait]
impl DiscoveryClient for SimpleDiscoveryClient {
    fn description(&self) -> &str {
        "SimpleDiscoveryClient"
    }

    /// Sorted, so derived route tables are stable across calls.
    async fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.instances.load().keys().cloned().collect();
        services.sort();
        services
    }

    async fn instances(&self, service_id: &str) -> Vec<ServiceInstance> {
        self.instances
            .load()
            .get(service_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_exposes_expression_properties() {
        let mut instance = ServiceInstance::new("orders", "10.0.0.7", 9000).with_metadata("zone", "eu");
        let properties: HashMap<String, String> = instance.properties().into_iter().collect();
        assert_eq!(properties["serviceId"], "orders");
        assert_eq!(properties["uri"], "http://10.0.0.7:9000");
        assert_eq!(properties["port"], "9000");
        assert_eq!(EvaluationContext::metadata(&instance)["zone"], "eu");

        instance.secure = true;
        assert_eq!(instance.effective_scheme(), "https");
        instance.scheme = Some("ws".into());
        assert_eq!(instance.effective_scheme(), "ws");
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_set() {
        let client = SimpleDiscoveryClient::new([
            ServiceInstance::new("b", "h1", 1),
            ServiceInstance::new("a", "h2", 2),
            ServiceInstance::new("a", "h3", 3),
        ]);
        assert_eq!(client.services().await, ["a", "b"]);
        assert_eq!(client.instances("a").await.len(), 2);

        client.replace([ServiceInstance::new("c", "h4", 4)]);
        assert_eq!(client.services().await, ["c"]);
        assert!(client.instances("a").await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_a_partial_replace() {
        let old_set = || [ServiceInstance::new("a", "h", 1), ServiceInstance::new("b", "h", 2)];
        let new_set = || [ServiceInstance::new("c", "h", 3), ServiceInstance::new("d", "h", 4)];
        let client = Arc::new(SimpleDiscoveryClient::new(old_set()));

        let writer = {
            let client = client.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    if i % 2 == 0 {
                        client.replace(new_set());
                    } else {
                        client.replace(old_set());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let services = client.services().await;
                        assert!(services == ["a", "b"] || services == ["c", "d"], "{services:?}");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
