//! Capability listing and trial dependency resolution.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, CapabilityListingDto, ListCapabilitiesQuery, ListCapabilitiesResponse, TrialResolveRequest};
use crate::model::Resolution;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_capabilities))
}

pub fn resolve_route() -> Router<AppState> {
    Router::new().route("/:id/resolve", post(trial_resolve))
}

async fn list_capabilities(
    State(state): State<AppState>,
    Query(query): Query<ListCapabilitiesQuery>,
) -> Json<ListCapabilitiesResponse> {
    let listings = state
        .query
        .list_capabilities(query.capability.as_deref(), query.tag.as_deref())
        .into_iter()
        .map(|l| CapabilityListingDto {
            provider_agent_id: l.provider_agent_id,
            provider_name: l.provider_name,
            namespace: l.namespace,
            name: l.capability.name,
            version: l.capability.version.to_string(),
            tags: l.capability.tags,
        })
        .collect();
    Json(ListCapabilitiesResponse { capabilities: listings })
}

async fn trial_resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TrialResolveRequest>,
) -> Result<Json<Resolution>, ApiError> {
    let agent = state.query.get_agent(id)?;
    let resolution = state.query.trial_resolve(&agent.namespace, &request.dependency)?;
    Ok(Json(resolution))
}
