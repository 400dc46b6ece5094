//! Typed configuration loaded from environment variables.
//!
//! Every variable is read once, validated, and folded into an immutable [`Config`]
//! at startup — handlers and background tasks receive the already-validated struct,
//! they never call `std::env::var` themselves.

use std::time::Duration;

use crate::error::{RegistryError, Result};

const ENV_PREFIX: &str = "MESH_REGISTRY_";

/// Registry service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Log level filter passed to `tracing_subscriber::EnvFilter`.
    pub log_level: String,
    /// Staleness after which a healthy agent becomes degraded.
    pub degraded_threshold: Duration,
    /// Staleness after which a degraded agent is evicted.
    pub evicted_threshold: Duration,
    /// How often the liveness monitor sweeps the catalog.
    pub liveness_sweep_interval: Duration,
    /// Response cache entry TTL.
    pub cache_ttl: Duration,
    /// Whether the response cache is enabled at all.
    pub cache_enabled: bool,
    /// LRU bound on the response cache. `0` means unbounded.
    pub cache_max_entries: usize,
    /// Default deadline for a register/heartbeat request, applied when the
    /// caller doesn't send an `x-request-timeout-ms` header.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7070,
            database_url: None,
            log_level: "mesh_registry=info,tower_http=info".to_string(),
            degraded_threshold: Duration::from_secs(20),
            evicted_threshold: Duration::from_secs(60),
            liveness_sweep_interval: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(30),
            cache_enabled: true,
            cache_max_entries: 10_000,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables (all prefixed `MESH_REGISTRY_`): `HOST`, `PORT`,
    /// `DATABASE_URL`, `LOG_LEVEL`, `DEGRADED_THRESHOLD_SECS`, `EVICTED_THRESHOLD_SECS`,
    /// `LIVENESS_SWEEP_INTERVAL_SECS`, `CACHE_TTL_SECS`, `CACHE_ENABLED`,
    /// `CACHE_MAX_ENTRIES`, `REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = env_string("HOST").unwrap_or(defaults.host);
        let port = env_parsed("PORT", defaults.port)?;
        let database_url = env_string("DATABASE_URL");
        let log_level = env_string("LOG_LEVEL").unwrap_or(defaults.log_level);
        let degraded_secs = env_parsed("DEGRADED_THRESHOLD_SECS", defaults.degraded_threshold.as_secs())?;
        let evicted_secs = env_parsed("EVICTED_THRESHOLD_SECS", defaults.evicted_threshold.as_secs())?;
        let sweep_secs = env_parsed(
            "LIVENESS_SWEEP_INTERVAL_SECS",
            defaults.liveness_sweep_interval.as_secs(),
        )?;
        let cache_ttl_secs = env_parsed("CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?;
        let cache_enabled = env_string("CACHE_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(defaults.cache_enabled);
        let cache_max_entries = env_parsed("CACHE_MAX_ENTRIES", defaults.cache_max_entries)?;
        let request_timeout_ms = env_parsed(
            "REQUEST_TIMEOUT_MS",
            defaults.request_timeout.as_millis() as u64,
        )?;

        if evicted_secs <= degraded_secs {
            return Err(RegistryError::Fatal(format!(
                "EVICTED_THRESHOLD_SECS ({evicted_secs}) must be greater than DEGRADED_THRESHOLD_SECS ({degraded_secs})"
            )));
        }

        Ok(Self {
            host,
            port,
            database_url,
            log_level,
            degraded_threshold: Duration::from_secs(degraded_secs),
            evicted_threshold: Duration::from_secs(evicted_secs),
            liveness_sweep_interval: Duration::from_secs(sweep_secs),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_enabled,
            cache_max_entries,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| RegistryError::Fatal(format!("invalid value for {ENV_PREFIX}{key}: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 7070);
        assert!(cfg.database_url.is_none());
        assert!(cfg.evicted_threshold > cfg.degraded_threshold);
    }

    #[test]
    fn test_bind_addr() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:7070");
    }
}
