//! Route composition: nests resource routers under `/api/v1`, mounts health
//! checks at the root.

pub mod agents;
pub mod capabilities;
pub mod health;

use axum::Router;

use crate::api::state::AppState;

pub fn api_router(state: AppState) -> Router {
    let v1 = Router::new()
        .nest("/agents", agents::routes().merge(capabilities::resolve_route()))
        .nest("/capabilities", capabilities::routes());

    Router::new()
        .nest("/api/v1", v1)
        .merge(health::health_routes())
        .with_state(state)
}
