//! Shared state for all API handlers.

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheStore, InMemoryCacheStore};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::heartbeat::HeartbeatProcessor;
use crate::query::QueryApi;
use crate::store::memory::InMemoryStore;
use crate::store::Store;

/// Everything an HTTP handler needs: the catalog, the heartbeat processor,
/// the query API, and the service configuration. Constructed once at
/// startup and cloned cheaply (every field is an `Arc`) into each request.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub cache: Arc<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
    pub heartbeat: Arc<HeartbeatProcessor>,
    pub query: Arc<QueryApi>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build default state: in-memory store, in-memory cache, system clock.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_store(Arc::new(InMemoryStore::new()), config).await
    }

    pub async fn with_store(store: Arc<dyn Store>, config: Config) -> Result<Self> {
        let catalog = Arc::new(Catalog::new(store));
        catalog.load_from_store().await?;
        let cache_config = CacheConfig {
            ttl: config.cache_ttl,
            max_entries: config.cache_max_entries,
            enabled: config.cache_enabled,
        };
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(cache_config));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let heartbeat = Arc::new(HeartbeatProcessor::new(
            catalog.clone(),
            cache.clone(),
            clock.clone(),
            config.cache_ttl,
            config.cache_enabled,
        ));
        let query = Arc::new(QueryApi::new(catalog.clone(), clock.clone()));

        Ok(Self {
            catalog,
            cache,
            clock,
            heartbeat,
            query,
            config: Arc::new(config),
        })
    }

    /// Override the clock (for tests driving the liveness monitor deterministically).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock.clone();
        self.heartbeat = Arc::new(HeartbeatProcessor::new(
            self.catalog.clone(),
            self.cache.clone(),
            clock.clone(),
            self.config.cache_ttl,
            self.config.cache_enabled,
        ));
        self.query = Arc::new(QueryApi::new(self.catalog.clone(), clock));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_creation() {
        let state = AppState::new(Config::default()).await.unwrap();
        assert!(state.query.list_agents(None, None, None).is_empty());
    }
}
