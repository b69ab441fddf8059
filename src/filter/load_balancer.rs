//! Resolves `lb://service` request URLs to a concrete instance.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;
use url::Url;

use super::route_to_request_url::merge_url;
use super::{GatewayFilter, LOAD_BALANCER_CLIENT_FILTER_ORDER};
use crate::discovery::ServiceInstance;
use crate::error::GatewayError;
use crate::exchange::ServerExchange;
use crate::handler::GatewayFilterChain;
use crate::load_balancer::LoadBalancerClient;

pub struct LoadBalancerClientFilter {
    client: Arc<dyn LoadBalancerClient>,
}

impl LoadBalancerClientFilter {
    pub fn new(client: Arc<dyn LoadBalancerClient>) -> Self {
        Self { client }
    }
}

/// Scheme of the upstream URL: the instance's own scheme, else the inner
/// scheme of an `lb:<scheme>://` route, else http/https from `secure`.
fn upstream_scheme<'a>(instance: &'a ServiceInstance, url: &'a Url, prefixed: bool) -> &'a str {
    match &instance.scheme {
        Some(scheme) => scheme.as_str(),
        None if prefixed => url.scheme(),
        None if instance.secure => "https",
        None => "http",
    }
}

#[async_trait]
impl GatewayFilter for LoadBalancerClientFilter {
    async fn filter(
        &self,
        exchange: &mut ServerExchange,
        chain: GatewayFilterChain,
    ) -> Result<(), GatewayError> {
        let prefix = exchange.attributes.scheme_prefix.clone();
        let url = match &exchange.attributes.request_url {
            Some(url) if url.scheme() == "lb" || prefix.as_deref() == Some("lb") => url.clone(),
            _ => return chain.proceed(exchange).await,
        };

        trace!(url = %url, "Load balancing request url");
        let service_id = url.host_str().unwrap_or_default().to_string();
        let instance = self
            .client
            .choose(&service_id)
            .await
            .ok_or_else(|| GatewayError::NoInstanceAvailable {
                service_id: service_id.clone(),
            })?;

        let scheme = upstream_scheme(&instance, &url, prefix.is_some());
        let target = Url::parse(&format!("{scheme}://{}:{}", instance.host, instance.port))
            .map_err(|e| GatewayError::InvalidRequestUrl {
                url: format!("{scheme}://{}:{}", instance.host, instance.port),
                reason: e.to_string(),
            })?;
        let chosen = merge_url(&target, url.path(), url.query())?;

        trace!(service_id = %service_id, url = %chosen, "Load balancer chose instance");
        exchange.rewrite_request_url(chosen);
        chain.proceed(exchange).await
    }

    fn name(&self) -> &str {
        "LoadBalancerClient"
    }

    fn order(&self) -> Option<i32> {
        Some(LOAD_BALANCER_CLIENT_FILTER_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SimpleDiscoveryClient;
    use crate::filter::OrderedFilter;
    use crate::handler::predicate::test_support::get;
    use crate::load_balancer::DiscoveryLoadBalancerClient;

    fn filter(instances: Vec<ServiceInstance>) -> LoadBalancerClientFilter {
        let discovery = Arc::new(SimpleDiscoveryClient::new(instances));
        LoadBalancerClientFilter::new(Arc::new(DiscoveryLoadBalancerClient::new(discovery)))
    }

    async fn run(filter: &LoadBalancerClientFilter, url: &str, prefix: Option<&str>) -> (ServerExchange, Result<(), GatewayError>) {
        let mut ex = get("/");
        ex.attributes.request_url = Some(Url::parse(url).unwrap());
        ex.attributes.scheme_prefix = prefix.map(str::to_string);
        let result = filter
            .filter(&mut ex, GatewayFilterChain::new(Vec::<OrderedFilter>::new().into()))
            .await;
        (ex, result)
    }

    #[tokio::test]
    async fn resolves_instance_and_keeps_history() {
        let lb = filter(vec![ServiceInstance::new("myservice", "10.0.0.1", 8080)]);
        let (ex, result) = run(&lb, "lb://myservice/orders?x=1", None).await;
        result.unwrap();

        assert_eq!(
            ex.attributes.request_url.unwrap().as_str(),
            "http://10.0.0.1:8080/orders?x=1"
        );
        assert_eq!(ex.attributes.original_request_urls[0].as_str(), "lb://myservice/orders?x=1");
    }

    #[tokio::test]
    async fn secure_and_prefixed_schemes() {
        let mut secure = ServiceInstance::new("s", "10.0.0.2", 8443);
        secure.secure = true;
        let lb = filter(vec![secure, ServiceInstance::new("ws", "10.0.0.3", 8080)]);

        let (ex, _) = run(&lb, "lb://s/", None).await;
        assert_eq!(ex.attributes.request_url.unwrap().scheme(), "https");

        let (ex, _) = run(&lb, "ws://ws/chat", Some("lb")).await;
        assert_eq!(ex.attributes.request_url.unwrap().as_str(), "ws://10.0.0.3:8080/chat");
    }

    #[tokio::test]
    async fn missing_instance_is_not_found() {
        let lb = filter(Vec::new());
        let (_, result) = run(&lb, "lb://myservice/", None).await;
        match result {
            Err(e @ GatewayError::NoInstanceAvailable { .. }) => {
                assert_eq!(e.status(), axum::http::StatusCode::NOT_FOUND);
                assert_eq!(e.to_string(), "unable to find instance for myservice");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn ignores_plain_urls() {
        let lb = filter(Vec::new());
        let (ex, result) = run(&lb, "http://localhost:9000/", None).await;
        result.unwrap();
        assert!(ex.attributes.original_request_urls.is_empty());
    }
}
