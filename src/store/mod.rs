//! Durable persistence for agents, capabilities, and dependency declarations.
//!
//! The [`Store`] is the source of truth across restarts; [`crate::catalog::Catalog`]
//! is a hot in-memory mirror rebuilt from it on startup.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Agent, AgentStatus, Capability};

/// Persistence contract for the registry core.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create or update an agent row by (namespace, name). Capabilities are
    /// written separately via [`Store::replace_capabilities`].
    async fn upsert_agent(&self, agent: &Agent) -> Result<()>;

    /// Atomically replace an agent's capability set, preserving dependency
    /// ordinal indices for capabilities that are unchanged by name.
    async fn replace_capabilities(&self, agent_id: Uuid, capabilities: &[Capability]) -> Result<()>;

    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>>;

    async fn list_all_agents(&self) -> Result<Vec<Agent>>;

    async fn update_status(&self, agent_id: Uuid, status: AgentStatus, at: DateTime<Utc>) -> Result<()>;

    async fn touch_heartbeat(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}
