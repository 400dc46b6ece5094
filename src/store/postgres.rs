//! PostgreSQL-backed [`Store`], built on `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use super::Store;
use crate::error::{RegistryError, Result};
use crate::model::{Agent, AgentStatus, Capability, Endpoint};

/// Schema applied at startup. Capabilities (with their nested dependency
/// declarations) are stored as a single JSONB column rather than normalized
/// tables: the whole set is always read and replaced atomically together
/// (`replace_capabilities`), so a relational join buys nothing here, and the
/// ordinal indices inside each declaration are preserved for free as plain
/// data rather than as a derived row order.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    namespace TEXT NOT NULL,
    version TEXT NOT NULL,
    endpoint_scheme TEXT NOT NULL,
    endpoint_host TEXT NOT NULL,
    endpoint_port INTEGER NOT NULL,
    capabilities JSONB NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'healthy',
    registered_at TIMESTAMPTZ NOT NULL,
    last_heartbeat TIMESTAMPTZ NOT NULL,
    UNIQUE (namespace, name)
);

CREATE INDEX IF NOT EXISTS idx_agents_namespace ON agents (namespace);
CREATE INDEX IF NOT EXISTS idx_agents_status ON agents (status);
CREATE INDEX IF NOT EXISTS idx_agents_capabilities_gin ON agents USING GIN (capabilities);

CREATE TABLE IF NOT EXISTS status_history (
    id BIGSERIAL PRIMARY KEY,
    agent_id UUID NOT NULL REFERENCES agents (id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_status_history_agent ON status_history (agent_id);

CREATE TABLE IF NOT EXISTS schema_meta (
    id BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (id),
    version INTEGER NOT NULL
);
"#;

const SCHEMA_VERSION: i32 = 1;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| RegistryError::Fatal(format!("failed to connect to postgres: {e}")))?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema and check the stored schema version against
    /// the binary's. Safe to call repeatedly (idempotent DDL). Refuses to
    /// start if the database was already migrated by a newer binary.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| RegistryError::Fatal(format!("schema migration failed: {e}")))?;

        let row = sqlx::query("SELECT version FROM schema_meta WHERE id = TRUE")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::Fatal(format!("failed to read schema_meta: {e}")))?;

        match row {
            None => {
                sqlx::query("INSERT INTO schema_meta (id, version) VALUES (TRUE, $1)")
                    .bind(SCHEMA_VERSION)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| RegistryError::Fatal(format!("failed to record schema version: {e}")))?;
            }
            Some(row) => {
                let stored: i32 = row.try_get("version").map_err(RegistryError::from)?;
                if stored > SCHEMA_VERSION {
                    return Err(RegistryError::Fatal(format!(
                        "database schema version {stored} is newer than this binary understands ({SCHEMA_VERSION})"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn schema_version(&self) -> i32 {
        SCHEMA_VERSION
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_agent(row: &sqlx::postgres::PgRow) -> Result<Agent> {
        let capabilities_json: serde_json::Value = row.try_get("capabilities")?;
        let capabilities: Vec<Capability> = serde_json::from_value(capabilities_json)?;
        let version_str: String = row.try_get("version")?;
        let status_str: String = row.try_get("status")?;
        Ok(Agent {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            namespace: row.try_get("namespace")?,
            version: version_str
                .parse()
                .map_err(|e| RegistryError::InvalidVersion(format!("{version_str}: {e}")))?,
            endpoint: Endpoint {
                scheme: row.try_get("endpoint_scheme")?,
                host: row.try_get("endpoint_host")?,
                port: row.try_get::<i32, _>("endpoint_port")? as u16,
            },
            capabilities,
            status: parse_status(&status_str)?,
            registered_at: row.try_get("registered_at")?,
            last_heartbeat: row.try_get("last_heartbeat")?,
        })
    }
}

fn status_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Healthy => "healthy",
        AgentStatus::Degraded => "degraded",
        AgentStatus::Evicted => "evicted",
    }
}

fn parse_status(raw: &str) -> Result<AgentStatus> {
    match raw {
        "healthy" => Ok(AgentStatus::Healthy),
        "degraded" => Ok(AgentStatus::Degraded),
        "evicted" => Ok(AgentStatus::Evicted),
        other => Err(RegistryError::Fatal(format!("unknown agent status in store: {other}"))),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_agent(&self, agent: &Agent) -> Result<()> {
        let capabilities_json = serde_json::to_value(&agent.capabilities)?;
        sqlx::query(
            r#"
            INSERT INTO agents (id, name, namespace, version, endpoint_scheme, endpoint_host,
                                 endpoint_port, capabilities, status, registered_at, last_heartbeat)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (namespace, name) DO UPDATE SET
                id = EXCLUDED.id,
                version = EXCLUDED.version,
                endpoint_scheme = EXCLUDED.endpoint_scheme,
                endpoint_host = EXCLUDED.endpoint_host,
                endpoint_port = EXCLUDED.endpoint_port,
                capabilities = EXCLUDED.capabilities,
                status = EXCLUDED.status,
                last_heartbeat = EXCLUDED.last_heartbeat
            "#,
        )
        .bind(agent.id)
        .bind(&agent.name)
        .bind(&agent.namespace)
        .bind(agent.version.to_string())
        .bind(&agent.endpoint.scheme)
        .bind(&agent.endpoint.host)
        .bind(agent.endpoint.port as i32)
        .bind(capabilities_json)
        .bind(status_str(agent.status))
        .bind(agent.registered_at)
        .bind(agent.last_heartbeat)
        .execute(&self.pool)
        .await
        .map_err(RegistryError::from)?;
        Ok(())
    }

    async fn replace_capabilities(&self, agent_id: Uuid, capabilities: &[Capability]) -> Result<()> {
        let capabilities_json = serde_json::to_value(capabilities)?;
        sqlx::query("UPDATE agents SET capabilities = $1 WHERE id = $2")
            .bind(capabilities_json)
            .bind(agent_id)
            .execute(&self.pool)
            .await
            .map_err(RegistryError::from)?;
        Ok(())
    }

    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RegistryError::from)?;
        row.as_ref().map(Self::row_to_agent).transpose()
    }

    async fn list_all_agents(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents")
            .fetch_all(&self.pool)
            .await
            .map_err(RegistryError::from)?;
        rows.iter().map(Self::row_to_agent).collect()
    }

    async fn update_status(&self, agent_id: Uuid, status: AgentStatus, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RegistryError::from)?;
        sqlx::query("UPDATE agents SET status = $1 WHERE id = $2")
            .bind(status_str(status))
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .map_err(RegistryError::from)?;
        sqlx::query("INSERT INTO status_history (agent_id, status, at) VALUES ($1, $2, $3)")
            .bind(agent_id)
            .bind(status_str(status))
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(RegistryError::from)?;
        tx.commit().await.map_err(RegistryError::from)?;
        Ok(())
    }

    async fn touch_heartbeat(&self, agent_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE agents SET last_heartbeat = $1 WHERE id = $2")
            .bind(at)
            .bind(agent_id)
            .execute(&self.pool)
            .await
            .map_err(RegistryError::from)?;
        Ok(())
    }
}
