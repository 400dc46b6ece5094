//! MCP Mesh registry and discovery core.
//!
//! Agents register their capabilities and dependency requirements, send
//! periodic heartbeats, and resolve their dependencies against the live
//! catalog of other registered agents.
//!
//! # Architecture
//!
//! 1. **Catalog**: the in-process source of truth for registered agents,
//!    backed by a pluggable [`Store`](store::Store) for durability.
//! 2. **Matcher**: tag-weighted, version-aware dependency resolution with
//!    required/preferred/excluded tag operators and OR-groups.
//! 3. **Liveness**: a two-threshold state machine (healthy → degraded →
//!    evicted) driven by a periodic sweep over heartbeat timestamps.
//! 4. **Heartbeat processing**: at-most-once, per-agent-serialized
//!    registration/heartbeat handling with a response cache keyed by a
//!    fingerprint of the submitted payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use mesh_registry::{ApiConfig, ApiServer, AppState, Config};
//!
//! let config = Config::default();
//! let state = AppState::new(config).await?;
//! let server = ApiServer::with_state(state, ApiConfig::default());
//! server.run().await?;
//! ```

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod liveness;
pub mod matcher;
pub mod model;
pub mod query;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

pub use cache::{keys as cache_keys, CacheConfig, CacheEntry, CacheStats, CacheStore, InMemoryCacheStore};
pub use catalog::Catalog;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{ErrorKind, RegistryError, Result};
pub use heartbeat::{HeartbeatProcessor, HeartbeatResponse};
pub use liveness::LivenessMonitor;
pub use matcher::resolve_dependency;
pub use model::{
    Agent, AgentStatus, Capability, DependencyDeclaration, Endpoint, RegistrationPayload,
    Resolution,
};
pub use query::QueryApi;
pub use store::memory::InMemoryStore;
pub use store::Store;

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresStore;

#[cfg(feature = "server")]
pub use api::{ApiConfig, ApiServer, AppState};
