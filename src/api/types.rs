//! API request/response envelopes and the error-to-HTTP-response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RegistryError};
use crate::model::{Agent, DependencyDeclaration};

#[derive(Debug, Serialize)]
pub struct ListAgentsResponse {
    pub agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    pub status: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListCapabilitiesResponse {
    pub capabilities: Vec<CapabilityListingDto>,
}

#[derive(Debug, Serialize)]
pub struct CapabilityListingDto {
    pub provider_agent_id: uuid::Uuid,
    pub provider_name: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCapabilitiesQuery {
    pub capability: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrialResolveRequest {
    #[serde(flatten)]
    pub dependency: DependencyDeclaration,
}

/// Wire-level error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: &'static str,
}

pub struct ApiError(pub RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::Transient => (StatusCode::SERVICE_UNAVAILABLE, "transient_error"),
            ErrorKind::Fatal => (StatusCode::INTERNAL_SERVER_ERROR, "fatal_error"),
        };
        let body = ApiErrorBody {
            error: self.0.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
