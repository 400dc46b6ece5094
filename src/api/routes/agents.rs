//! Agent registration, heartbeat, listing, and administrative eviction.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, ListAgentsQuery, ListAgentsResponse};
use crate::error::RegistryError;
use crate::heartbeat::HeartbeatResponse;
use crate::model::{Agent, AgentStatus, RegistrationPayload};

/// Header a caller may set to bound how long registration is allowed to
/// take, in milliseconds. Falls back to `Config::request_timeout`.
const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/", get(list_agents))
        .route("/:id", get(get_agent))
        .route("/:id", delete(evict_agent))
}

fn request_deadline(state: &AppState, headers: &HeaderMap) -> chrono::DateTime<chrono::Utc> {
    let timeout_ms = headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(std::time::Duration::from_millis)
        .unwrap_or(state.config.request_timeout);
    state.clock.now()
        + chrono::Duration::from_std(timeout_ms).unwrap_or_else(|_| chrono::Duration::seconds(5))
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegistrationPayload>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let deadline = request_deadline(&state, &headers);
    let response = state.heartbeat.process(payload, Some(deadline)).await?;
    Ok(Json(response))
}

fn parse_status(raw: &str) -> Result<AgentStatus, RegistryError> {
    match raw {
        "healthy" => Ok(AgentStatus::Healthy),
        "degraded" => Ok(AgentStatus::Degraded),
        "evicted" => Ok(AgentStatus::Evicted),
        other => Err(RegistryError::Validation(format!("unknown status filter: {other}"))),
    }
}

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<ListAgentsResponse>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let agents: Vec<Agent> = state
        .query
        .list_agents(status, query.namespace.as_deref(), query.name.as_deref());
    Ok(Json(ListAgentsResponse { agents }))
}

async fn get_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Agent>, ApiError> {
    let agent = state.query.get_agent(id)?;
    Ok(Json(agent))
}

async fn evict_agent(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<(), ApiError> {
    let now = state.clock.now();
    state.catalog.evict(id, now).await?;
    Ok(())
}
