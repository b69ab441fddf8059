//! Route table refresh through config reload and the admin API.

use std::net::SocketAddr;

use route_gateway::admin::setup_admin_router;
use route_gateway::config::GatewayConfig;
use route_gateway::definition::RouteDefinition;
use tokio::net::TcpListener;
use url::Url;

mod common;

const API_KEY: &str = "test-admin-key";

fn config_with(routes: Vec<RouteDefinition>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gateway.routes = routes;
    config.admin.api_key = API_KEY.to_string();
    config
}

fn path_route(id: &str, backend: SocketAddr, path: &str) -> RouteDefinition {
    RouteDefinition::new(id, Url::parse(&format!("http://{backend}")).unwrap())
        .predicate(format!("Path={path}").parse().unwrap())
}

async fn start_admin(gateway: &common::TestGateway) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = setup_admin_router(gateway.state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

async fn status(client: &reqwest::Client, url: String) -> u16 {
    client.get(url).send().await.unwrap().status().as_u16()
}

#[tokio::test]
async fn reloaded_config_takes_effect_after_refresh() {
    let backend = common::start_mock_backend("ok").await;
    let gateway = common::start_gateway(config_with(vec![path_route("old", backend, "/old")])).await;
    let client = common::client();

    assert_eq!(status(&client, gateway.url("/old")).await, 200);

    gateway
        .config_updates
        .send(config_with(vec![path_route("new", backend, "/new")]))
        .unwrap();

    assert!(common::eventually_status(&client, &gateway.url("/new"), 200).await);
    assert_eq!(status(&client, gateway.url("/old")).await, 404);
}

#[tokio::test]
async fn admin_api_requires_the_bearer_key() {
    let gateway = common::start_gateway(config_with(Vec::new())).await;
    let admin = start_admin(&gateway).await;
    let client = common::client();

    let res = client
        .get(format!("http://{admin}/actuator/gateway/routes"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("http://{admin}/actuator/gateway/globalfilters"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    let filters: serde_json::Value = res.json().await.unwrap();
    assert_eq!(filters["RouteToRequestUrl"], 10000);
    assert_eq!(filters["LoadBalancerClient"], 10100);
}

#[tokio::test]
async fn saved_routes_appear_only_after_refresh() {
    let backend = common::start_mock_backend("saved").await;
    let gateway = common::start_gateway(config_with(Vec::new())).await;
    let admin = start_admin(&gateway).await;
    let client = common::client();
    let base = format!("http://{admin}/actuator/gateway");

    // Warm the cache so the saved route is not picked up by a first compile.
    assert_eq!(status(&client, gateway.url("/saved")).await, 404);

    let res = client
        .post(format!("{base}/routes/saved"))
        .bearer_auth(API_KEY)
        .json(&serde_json::json!({
            "uri": format!("http://{backend}"),
            "predicates": ["Path=/saved"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(status(&client, gateway.url("/saved")).await, 404);

    let res = client
        .post(format!("{base}/refresh"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(common::eventually_status(&client, &gateway.url("/saved"), 200).await);

    let routes: serde_json::Value = client
        .get(format!("{base}/routes"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes[0]["route_id"], "saved");

    let res = client
        .delete(format!("{base}/routes/saved"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .delete(format!("{base}/routes/saved"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}
