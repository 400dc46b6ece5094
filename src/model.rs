//! Core domain types: agents, capabilities, dependency declarations, and resolutions.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Liveness state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Healthy,
    Degraded,
    Evicted,
}

/// Network location of an agent's MCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn to_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A single dependency an agent's capability declares on some provider.
///
/// `tags` holds the raw, unparsed atoms (`tag`, `+tag`, `-tag`, `(a|b)`) in
/// declaration order; the [`crate::matcher`] module is responsible for
/// interpreting them. `ordinal` is stable across heartbeats and determines
/// the position of this dependency's resolution in a heartbeat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub ordinal: u32,
    pub capability: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub version_constraint: Option<String>,
    pub namespace: Option<String>,
}

/// A capability an agent exposes, together with what it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub tags: Vec<String>,
    pub description: Option<String>,
    /// Opaque schema blob. The registry never introspects it.
    #[serde(default)]
    pub schema: serde_json::Value,
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

/// A registered agent and its declared capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    pub version: Version,
    pub endpoint: Endpoint,
    pub capabilities: Vec<Capability>,
    pub status: AgentStatus,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Agent {
    /// The (namespace, name) pair that uniquely identifies this logical agent.
    pub fn identity(&self) -> (&str, &str) {
        (&self.namespace, &self.name)
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }
}

/// A payload submitted to `POST /agents/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationPayload {
    pub id: Option<Uuid>,
    pub name: String,
    pub namespace: String,
    pub version: Version,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

/// The outcome of resolving one [`DependencyDeclaration`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        ordinal: u32,
        provider_agent_id: Uuid,
        provider_capability: String,
        endpoint: Endpoint,
        version: Version,
        score: u32,
        resolved_at: DateTime<Utc>,
    },
    Unresolved {
        ordinal: u32,
        reason: String,
    },
}

impl Resolution {
    pub fn ordinal(&self) -> u32 {
        match self {
            Resolution::Resolved { ordinal, .. } => *ordinal,
            Resolution::Unresolved { ordinal, .. } => *ordinal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_identity() {
        let agent = sample_agent();
        assert_eq!(agent.identity(), ("default", "weather-agent"));
    }

    #[test]
    fn test_capability_lookup() {
        let agent = sample_agent();
        assert!(agent.capability("weather").is_some());
        assert!(agent.capability("missing").is_none());
    }

    fn sample_agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "weather-agent".into(),
            namespace: "default".into(),
            version: Version::new(1, 0, 0),
            endpoint: Endpoint {
                scheme: "http".into(),
                host: "127.0.0.1".into(),
                port: 9000,
            },
            capabilities: vec![Capability {
                name: "weather".into(),
                version: Version::new(1, 0, 0),
                tags: vec!["api".into(), "fast".into()],
                description: None,
                schema: serde_json::Value::Null,
                dependencies: vec![],
            }],
            status: AgentStatus::Healthy,
            registered_at: Utc::now(),
            last_heartbeat: Utc::now(),
        }
    }
}
