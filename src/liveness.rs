//! Periodic sweep transitioning agents through healthy → degraded → evicted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::model::AgentStatus;

pub struct LivenessMonitor {
    catalog: Arc<Catalog>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    degraded_threshold: chrono::Duration,
    evicted_threshold: chrono::Duration,
}

impl LivenessMonitor {
    pub fn new(
        catalog: Arc<Catalog>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        degraded_threshold: Duration,
        evicted_threshold: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            clock,
            degraded_threshold: chrono::Duration::from_std(degraded_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(20)),
            evicted_threshold: chrono::Duration::from_std(evicted_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }

    /// Run one sweep over every non-evicted agent, applying transitions.
    /// Returns the number of agents transitioned this tick.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut transitioned = 0;

        for (agent_id, status, last_heartbeat) in self.catalog.heartbeat_snapshot() {
            let staleness = now - last_heartbeat;

            match status {
                AgentStatus::Healthy if staleness > self.degraded_threshold => {
                    match self.catalog.mark_degraded(agent_id, now).await {
                        Ok(true) => {
                            transitioned += 1;
                            self.invalidate_agent(agent_id).await;
                            tracing::info!(%agent_id, "agent transitioned to degraded");
                        }
                        Ok(false) => {}
                        Err(err) => tracing::warn!(%agent_id, error = %err, "failed to mark agent degraded"),
                    }
                }
                AgentStatus::Degraded if staleness > self.evicted_threshold => {
                    match self.catalog.mark_evicted(agent_id, now).await {
                        Ok(true) => {
                            transitioned += 1;
                            self.invalidate_agent(agent_id).await;
                            tracing::info!(%agent_id, "agent evicted");
                        }
                        Ok(false) => {}
                        Err(err) => tracing::warn!(%agent_id, error = %err, "failed to evict agent"),
                    }
                }
                _ => {}
            }
        }

        transitioned
    }

    async fn invalidate_agent(&self, agent_id: Uuid) {
        let Some(agent) = self.catalog.get(agent_id) else {
            return;
        };
        for capability in &agent.capabilities {
            if let Err(err) = self.cache.delete_by_capability(&agent.namespace, &capability.name).await {
                tracing::warn!(capability = %capability.name, error = %err, "cache invalidation failed during liveness sweep");
            }
        }
    }

    /// Spawn the sweep as a background task running at `interval`.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}
