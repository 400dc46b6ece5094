//! Combined register+heartbeat request handling.
//!
//! Mirrors the check-cache → compute → cache → invalidate shape the teacher
//! uses for its package resolution path: a cache hit short-circuits before
//! any catalog mutation; a miss mutates the catalog, resolves dependencies,
//! then caches the assembled response and invalidates any other consumer's
//! cache entry that referenced a capability this request changed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::cache::{keys, CacheEntry, CacheStore, SingleFlight};
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::error::Result;
use crate::matcher::{self, Candidate};
use crate::model::{Agent, RegistrationPayload, Resolution};

/// Per-capability resolutions, in the consumer capability's declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityResolutions {
    pub capability: String,
    pub resolutions: Vec<Resolution>,
}

/// The assembled response to a `POST /agents/register` request.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResponse {
    pub agent_id: Uuid,
    pub status: crate::model::AgentStatus,
    pub version: u64,
    pub dependencies_resolved: Vec<CapabilityResolutions>,
}

pub struct HeartbeatProcessor {
    catalog: Arc<Catalog>,
    cache: Arc<dyn CacheStore>,
    single_flight: Arc<SingleFlight>,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
    cache_enabled: bool,
    versions: DashMap<Uuid, AtomicU64>,
}

impl HeartbeatProcessor {
    pub fn new(
        catalog: Arc<Catalog>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
        cache_enabled: bool,
    ) -> Self {
        Self {
            catalog,
            cache,
            single_flight: Arc::new(SingleFlight::new()),
            clock,
            cache_ttl,
            cache_enabled,
            versions: DashMap::new(),
        }
    }

    fn current_version(&self, agent_id: Uuid) -> u64 {
        self.versions
            .entry(agent_id)
            .or_insert_with(|| AtomicU64::new(0))
            .load(Ordering::SeqCst)
    }

    fn bump_version(&self, agent_id: Uuid) -> u64 {
        self.versions
            .entry(agent_id)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    /// `Err` if `deadline` is set and has already elapsed.
    fn check_deadline(&self, deadline: Option<DateTime<Utc>>) -> Result<()> {
        if let Some(deadline) = deadline {
            if self.clock.now() > deadline {
                return Err(crate::error::RegistryError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Handle one register+heartbeat request.
    pub async fn process(&self, payload: RegistrationPayload, deadline: Option<DateTime<Utc>>) -> Result<HeartbeatResponse> {
        self.check_deadline(deadline)?;
        let now = self.clock.now();

        let provisional_agent_id = payload
            .id
            .or_else(|| self.catalog.lookup_id(&payload.namespace, &payload.name))
            .unwrap_or_else(Uuid::new_v4);
        let prior_version = self.current_version(provisional_agent_id);
        let capability_names: Vec<&str> = payload.capabilities.iter().map(|c| c.name.as_str()).collect();
        let dependencies: Vec<&crate::model::DependencyDeclaration> = payload
            .capabilities
            .iter()
            .flat_map(|c| c.dependencies.iter())
            .collect();
        let fingerprint = keys::fingerprint(
            provisional_agent_id,
            &payload.namespace,
            &capability_names,
            &dependencies,
            Some(prior_version),
        );

        if self.cache_enabled {
            if let Some(hit) = self.cache.get(&fingerprint).await? {
                let response: HeartbeatResponse = serde_json::from_slice(&hit.response)?;
                return Ok(response);
            }
        }

        let catalog = &self.catalog;
        let cache = &self.cache;
        let ttl = self.cache_ttl;
        let cache_enabled = self.cache_enabled;

        let entry = self
            .single_flight
            .get_or_compute(cache.as_ref(), &fingerprint, || async move {
                let (agent, changed) = catalog.register(payload, now).await?;

                // Invalidate other consumers' cached resolutions against the
                // capabilities this registration changed *before* caching this
                // response, so the entry we're about to write isn't immediately
                // swept up by its own invalidation (it carries the same tags).
                for name in &changed {
                    if let Err(err) = cache.delete_by_capability(&agent.namespace, name).await {
                        tracing::warn!(capability = %name, error = %err, "cache invalidation failed, continuing");
                    }
                }

                let response = self.assemble_response(&agent, now).await?;

                self.check_deadline(deadline)?;
                let serialized = serde_json::to_vec(&response)?;
                if cache_enabled {
                    self.check_deadline(deadline)?;
                    let capability_tags: Vec<(String, String)> = agent
                        .capabilities
                        .iter()
                        .map(|c| (agent.namespace.clone(), c.name.clone()))
                        .collect();
                    cache
                        .set(
                            &fingerprint,
                            CacheEntry { response: serialized.clone(), version: response.version },
                            ttl,
                            &capability_tags,
                        )
                        .await?;
                }

                Ok(CacheEntry { response: serialized, version: response.version })
            })
            .await?;

        let response: HeartbeatResponse = serde_json::from_slice(&entry.response)?;
        Ok(response)
    }

    async fn assemble_response(&self, agent: &Agent, now: DateTime<Utc>) -> Result<HeartbeatResponse> {
        let version = self.bump_version(agent.id);

        let mut dependencies_resolved = Vec::with_capacity(agent.capabilities.len());
        for capability in &agent.capabilities {
            let mut resolutions = Vec::with_capacity(capability.dependencies.len());
            for dep in &capability.dependencies {
                let candidates = self.catalog.providers_for(dep.capability.as_deref(), dep.namespace.as_deref().unwrap_or(&agent.namespace));
                let candidate_views: Vec<Candidate<'_>> = candidates
                    .iter()
                    .filter(|c| c.agent.id != agent.id || c.capability.name != capability.name)
                    .map(|c| Candidate { agent: &c.agent, capability: &c.capability })
                    .collect();
                let resolution = matcher::resolve_dependency(dep, candidate_views, now)?;
                resolutions.push(resolution);
            }
            resolutions.sort_by_key(|r| r.ordinal());
            dependencies_resolved.push(CapabilityResolutions {
                capability: capability.name.clone(),
                resolutions,
            });
        }

        Ok(HeartbeatResponse {
            agent_id: agent.id,
            status: agent.status,
            version,
            dependencies_resolved,
        })
    }
}
