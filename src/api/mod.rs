//! HTTP API for the registry and discovery core.
//!
//! # Architecture
//!
//! ```text
//! /api/v1/
//! ├── agents/        - registration, heartbeat, listing, eviction
//! │   └── :id/resolve - trial dependency resolution against a consumer
//! └── capabilities/  - capability catalog listing
//! /health, /ready     - liveness and readiness probes
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use mesh_registry::api::{ApiConfig, ApiServer, AppState};
//! use mesh_registry::config::Config;
//!
//! let state = AppState::new(Config::default()).await?;
//! let server = ApiServer::with_state(state, ApiConfig::default());
//! server.run().await?;
//! ```

#[cfg(feature = "server")]
pub mod middleware;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod state;
#[cfg(feature = "server")]
pub mod types;

#[cfg(feature = "server")]
pub use server::{shutdown_signal, ApiConfig, ApiServer};
#[cfg(feature = "server")]
pub use state::AppState;
#[cfg(feature = "server")]
pub use types::*;
