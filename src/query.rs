//! Read-side operations composing the Catalog and Matcher.

use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::error::{RegistryError, Result};
use crate::matcher::{self, Candidate};
use crate::model::{Agent, AgentStatus, Capability, DependencyDeclaration, Resolution};

pub struct QueryApi {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
}

/// A capability together with the agent that provides it, for `/capabilities`.
#[derive(Debug, Clone)]
pub struct CapabilityListing {
    pub provider_agent_id: Uuid,
    pub provider_name: String,
    pub namespace: String,
    pub capability: Capability,
}

impl QueryApi {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    pub fn list_agents(&self, status: Option<AgentStatus>, namespace: Option<&str>, name: Option<&str>) -> Vec<Agent> {
        self.catalog
            .list(status, namespace)
            .into_iter()
            .filter(|a| name.map(|n| a.name == n).unwrap_or(true))
            .collect()
    }

    pub fn get_agent(&self, agent_id: Uuid) -> Result<Agent> {
        self.catalog
            .get(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_string()))
    }

    pub fn list_capabilities(&self, capability_name: Option<&str>, tag: Option<&str>) -> Vec<CapabilityListing> {
        self.catalog
            .list_capabilities(tag)
            .into_iter()
            .filter(|p| capability_name.map(|n| p.capability.name == n).unwrap_or(true))
            .map(|p| CapabilityListing {
                provider_agent_id: p.agent.id,
                provider_name: p.agent.name.clone(),
                namespace: p.agent.namespace.clone(),
                capability: p.capability,
            })
            .collect()
    }

    /// What a dependency declaration would resolve to right now, without
    /// registering anything or touching the response cache.
    pub fn trial_resolve(
        &self,
        consumer_namespace: &str,
        dependency: &DependencyDeclaration,
    ) -> Result<Resolution> {
        let namespace = dependency.namespace.as_deref().unwrap_or(consumer_namespace);
        let candidates = self.catalog.providers_for(dependency.capability.as_deref(), namespace);
        let views: Vec<Candidate<'_>> = candidates
            .iter()
            .map(|c| Candidate { agent: &c.agent, capability: &c.capability })
            .collect();
        matcher::resolve_dependency(dependency, views, self.clock.now())
    }
}
