//! In-memory [`Store`] implementation, used by default and by tests.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::Store;
use crate::error::Result;
use crate::model::{Agent, AgentStatus, Capability};

#[derive(Default)]
pub struct InMemoryStore {
    agents: DashMap<Uuid, RwLock<Agent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_agent(&self, agent: &Agent) -> Result<()> {
        self.agents.insert(agent.id, RwLock::new(agent.clone()));
        Ok(())
    }

    async fn replace_capabilities(&self, agent_id: Uuid, capabilities: &[Capability]) -> Result<()> {
        if let Some(entry) = self.agents.get(&agent_id) {
            entry.write().unwrap().capabilities = capabilities.to_vec();
        }
        Ok(())
    }

    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>> {
        Ok(self.agents.get(&agent_id).map(|e| e.read().unwrap().clone()))
    }

    async fn list_all_agents(&self) -> Result<Vec<Agent>> {
        Ok(self.agents.iter().map(|e| e.read().unwrap().clone()).collect())
    }

    async fn update_status(&self, agent_id: Uuid, status: AgentStatus, _at: DateTime<Utc>) -> Result<()> {
        if let Some(entry) = self.agents.get(&agent_id) {
            entry.write().unwrap().status = status;
        }
        Ok(())
    }

    async fn touch_heartbeat(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(entry) = self.agents.get(&agent_id) {
            entry.write().unwrap().last_heartbeat = at;
        }
        Ok(())
    }
}
