//! Admin API (actuator-style).
//!
//! # Endpoints
//! ```text
//! GET    /actuator/gateway/routes          compiled route table
//! GET    /actuator/gateway/routes/{id}     one compiled route
//! POST   /actuator/gateway/routes/{id}     save a definition to the repository
//! DELETE /actuator/gateway/routes/{id}     delete a saved definition
//! POST   /actuator/gateway/refresh         publish RefreshRoutes
//! GET    /actuator/gateway/globalfilters   global filters and their orders
//! ```
//!
//! # Design Decisions
//! - Saving and deleting never refresh by themselves; `refresh` is the only
//!   way to make repository changes visible
//! - Every endpoint requires `Authorization: Bearer <admin.api_key>`

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/actuator/gateway/routes", get(list_routes))
        .route(
            "/actuator/gateway/routes/{id}",
            get(get_route).post(save_route).delete(delete_route),
        )
        .route("/actuator/gateway/refresh", post(refresh))
        .route("/actuator/gateway/globalfilters", get(global_filters))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
