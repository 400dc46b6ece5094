//! In-memory view of live agents and capabilities.
//!
//! The catalog is the sole mutator of agent/capability state. Every mutation is
//! written through to the [`crate::store::Store`] before becoming visible to
//! readers, and registration/heartbeat calls for a single agent identity are
//! serialized through a per-identity lock so two concurrent requests for the
//! same agent can never interleave a capability replacement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::{RegistryError, Result};
use crate::model::{Agent, AgentStatus, Capability, RegistrationPayload};
use crate::store::Store;

/// A capability offered by some agent, detached from the catalog's internal
/// locking so the [`crate::matcher`] can iterate it freely.
#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub agent: Agent,
    pub capability: Capability,
}

type Identity = (String, String);

pub struct Catalog {
    store: Arc<dyn Store>,
    agents: DashMap<Uuid, Agent>,
    identity_index: DashMap<Identity, Uuid>,
    identity_locks: DashMap<Identity, Arc<AsyncMutex<()>>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            agents: DashMap::new(),
            identity_index: DashMap::new(),
            identity_locks: DashMap::new(),
        }
    }

    /// Rebuild the in-memory view from the store. Call once at startup.
    pub async fn load_from_store(&self) -> Result<()> {
        for agent in self.store.list_all_agents().await? {
            self.identity_index
                .insert((agent.namespace.clone(), agent.name.clone()), agent.id);
            self.agents.insert(agent.id, agent);
        }
        Ok(())
    }

    fn identity_lock(&self, identity: Identity) -> Arc<AsyncMutex<()>> {
        self.identity_locks
            .entry(identity)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Register (or re-register) an agent, returning the stored record and the
    /// set of capability names whose declaration changed relative to any prior
    /// registration under the same identity.
    pub async fn register(&self, payload: RegistrationPayload, now: DateTime<Utc>) -> Result<(Agent, Vec<String>)> {
        validate_payload(&payload)?;

        let identity = (payload.namespace.clone(), payload.name.clone());
        let lock = self.identity_lock(identity.clone());
        let _guard = lock.lock().await;

        let existing = self
            .identity_index
            .get(&identity)
            .map(|id| *id)
            .and_then(|id| self.agents.get(&id).map(|a| a.clone()));

        if let Some(existing) = &existing {
            if existing.status != AgentStatus::Evicted {
                if let Some(declared_id) = payload.id {
                    if declared_id != existing.id && payload.endpoint != existing.endpoint {
                        return Err(RegistryError::Conflict(format!(
                            "({}, {}) is held by a live agent with a different id and endpoint",
                            payload.namespace, payload.name
                        )));
                    }
                }
            }
        }

        let id = existing.as_ref().map(|a| a.id).unwrap_or_else(Uuid::new_v4);
        let registered_at = existing.as_ref().map(|a| a.registered_at).unwrap_or(now);

        let changed = diff_capabilities(existing.as_ref().map(|a| a.capabilities.as_slice()), &payload.capabilities);

        let agent = Agent {
            id,
            name: payload.name,
            namespace: payload.namespace,
            version: payload.version,
            endpoint: payload.endpoint,
            capabilities: payload.capabilities,
            status: AgentStatus::Healthy,
            registered_at,
            last_heartbeat: now,
        };

        self.store.upsert_agent(&agent).await?;
        self.store.replace_capabilities(id, &agent.capabilities).await?;

        self.identity_index.insert(identity, id);
        self.agents.insert(id, agent.clone());

        Ok((agent, changed))
    }

    /// Update an agent's last-heartbeat timestamp, reviving it from degraded
    /// to healthy if it was not yet evicted.
    pub async fn heartbeat(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<Agent> {
        let mut entry = self
            .agents
            .get_mut(&agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_string()))?;
        entry.last_heartbeat = at;
        if entry.status == AgentStatus::Degraded {
            entry.status = AgentStatus::Healthy;
        }
        let snapshot = entry.clone();
        drop(entry);
        self.store.touch_heartbeat(agent_id, at).await?;
        if snapshot.status == AgentStatus::Healthy {
            self.store.update_status(agent_id, AgentStatus::Healthy, at).await?;
        }
        Ok(snapshot)
    }

    pub async fn mark_degraded(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.transition(agent_id, AgentStatus::Healthy, AgentStatus::Degraded, at)
            .await
    }

    pub async fn mark_evicted(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let transitioned_from_degraded = self
            .transition(agent_id, AgentStatus::Degraded, AgentStatus::Evicted, at)
            .await?;
        Ok(transitioned_from_degraded)
    }

    async fn transition(
        &self,
        agent_id: Uuid,
        from: AgentStatus,
        to: AgentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = {
            let mut entry = match self.agents.get_mut(&agent_id) {
                Some(e) => e,
                None => return Ok(false),
            };
            if entry.status == from {
                entry.status = to;
                true
            } else {
                false
            }
        };
        if changed {
            self.store.update_status(agent_id, to, at).await?;
        }
        Ok(changed)
    }

    /// Administrative eviction, regardless of current status.
    pub async fn evict(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        {
            let mut entry = self
                .agents
                .get_mut(&agent_id)
                .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_string()))?;
            entry.status = AgentStatus::Evicted;
        }
        self.store.update_status(agent_id, AgentStatus::Evicted, at).await?;
        Ok(())
    }

    pub fn get(&self, agent_id: Uuid) -> Option<Agent> {
        self.agents.get(&agent_id).map(|a| a.clone())
    }

    /// The current agent id registered under (namespace, name), if any.
    pub fn lookup_id(&self, namespace: &str, name: &str) -> Option<Uuid> {
        self.identity_index
            .get(&(namespace.to_string(), name.to_string()))
            .map(|id| *id)
    }

    pub fn list(&self, status: Option<AgentStatus>, namespace: Option<&str>) -> Vec<Agent> {
        self.agents
            .iter()
            .map(|e| e.clone())
            .filter(|a| status.map(|s| a.status == s).unwrap_or(true))
            .filter(|a| namespace.map(|ns| a.namespace == ns).unwrap_or(true))
            .collect()
    }

    /// All agent-id, timestamp pairs currently healthy or degraded — used by
    /// the liveness monitor's sweep.
    pub fn heartbeat_snapshot(&self) -> Vec<(Uuid, AgentStatus, DateTime<Utc>)> {
        self.agents
            .iter()
            .filter(|e| e.status != AgentStatus::Evicted)
            .map(|e| (e.id, e.status, e.last_heartbeat))
            .collect()
    }

    /// Healthy providers of `capability_name` (or all capabilities, if `None`)
    /// in `namespace`.
    pub fn providers_for(&self, capability_name: Option<&str>, namespace: &str) -> Vec<ProviderSnapshot> {
        self.agents
            .iter()
            .filter(|e| e.status == AgentStatus::Healthy && e.namespace == namespace)
            .flat_map(|e| {
                e.capabilities
                    .iter()
                    .filter(|c| capability_name.map(|n| c.name == n).unwrap_or(true))
                    .map(|c| ProviderSnapshot {
                        agent: e.clone(),
                        capability: c.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn list_capabilities(&self, tag: Option<&str>) -> Vec<ProviderSnapshot> {
        self.agents
            .iter()
            .flat_map(|e| {
                e.capabilities
                    .iter()
                    .filter(|c| tag.map(|t| c.tags.iter().any(|ct| ct == t)).unwrap_or(true))
                    .map(|c| ProviderSnapshot {
                        agent: e.clone(),
                        capability: c.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn validate_payload(payload: &RegistrationPayload) -> Result<()> {
    if payload.name.trim().is_empty() {
        return Err(RegistryError::Validation("agent name must not be empty".into()));
    }
    if payload.namespace.trim().is_empty() {
        return Err(RegistryError::Validation("namespace must not be empty".into()));
    }
    let mut seen_names = std::collections::HashSet::new();
    for cap in &payload.capabilities {
        if !seen_names.insert(cap.name.clone()) {
            return Err(RegistryError::Validation(format!(
                "duplicate capability name in payload: {}",
                cap.name
            )));
        }
        let mut seen_ordinals = std::collections::HashSet::new();
        for dep in &cap.dependencies {
            if !seen_ordinals.insert(dep.ordinal) {
                return Err(RegistryError::Validation(format!(
                    "ordinal collision in capability {}: {}",
                    cap.name, dep.ordinal
                )));
            }
        }
    }
    Ok(())
}

/// Names of capabilities present in `new` that were absent, or differently
/// declared, relative to `previous`.
fn diff_capabilities(previous: Option<&[Capability]>, new: &[Capability]) -> Vec<String> {
    let previous = previous.unwrap_or(&[]);
    let mut changed = Vec::new();
    for cap in new {
        match previous.iter().find(|p| p.name == cap.name) {
            Some(prior) if prior == cap => {}
            _ => changed.push(cap.name.clone()),
        }
    }
    for prior in previous {
        if !new.iter().any(|c| c.name == prior.name) {
            changed.push(prior.name.clone());
        }
    }
    changed
}
