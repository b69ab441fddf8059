use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::definition::RouteDefinition;
use crate::event::GatewayEvent;
use crate::http::server::AppState;
use crate::route::Route;

#[derive(Debug, Serialize)]
pub struct RouteView {
    pub route_id: String,
    pub uri: String,
    pub order: i32,
    pub predicate: String,
    pub filters: Vec<String>,
}

impl From<&Route> for RouteView {
    fn from(route: &Route) -> Self {
        Self {
            route_id: route.id().to_string(),
            uri: route.uri().to_string(),
            order: route.order(),
            predicate: route.predicate().name().to_string(),
            filters: route
                .filters()
                .iter()
                .map(|f| format!("[{}, order = {}]", f.name(), f.order()))
                .collect(),
        }
    }
}

pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<RouteView>> {
    let routes = state.routes.snapshot().await;
    Json(routes.iter().map(|r| RouteView::from(r.as_ref())).collect())
}

pub async fn get_route(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let routes = state.routes.snapshot().await;
    match routes.iter().find(|r| r.id() == id) {
        Some(route) => Json(RouteView::from(route.as_ref())).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The path id wins over any id in the body.
pub async fn save_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut definition): Json<RouteDefinition>,
) -> StatusCode {
    definition.id = id;
    state.repository.save(definition).await;
    StatusCode::CREATED
}

pub async fn delete_route(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.repository.delete(&id).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

pub async fn refresh(State(state): State<AppState>) -> StatusCode {
    state.events.publish(GatewayEvent::RefreshRoutes);
    StatusCode::OK
}

pub async fn global_filters(State(state): State<AppState>) -> Json<BTreeMap<String, i32>> {
    Json(
        state
            .handler
            .global_filters()
            .iter()
            .map(|f| (f.name().to_string(), f.order()))
            .collect(),
    )
}
