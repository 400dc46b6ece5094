//! Error types for the registry core.

use thiserror::Error;

/// Registry result type.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur in registry operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Malformed registration payload, bad tag operator, unparsable version constraint, etc.
    #[error("validation error: {0}")]
    Validation(String),

    /// (namespace, name) collision with an unrelated live agent.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Agent not found.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Capability not found.
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    /// Store unavailable, serialization race, or similar — safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Schema mismatch, corrupt persisted state, bad startup configuration.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Cache backend failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The request's deadline elapsed before processing completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Invalid version string or constraint.
    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

impl RegistryError {
    /// Coarse error kind, used to choose an HTTP status code at the API boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Validation(_) | RegistryError::InvalidVersion(_) => {
                ErrorKind::Validation
            }
            RegistryError::Conflict(_) => ErrorKind::Conflict,
            RegistryError::AgentNotFound(_) | RegistryError::CapabilityNotFound(_) => {
                ErrorKind::NotFound
            }
            RegistryError::Transient(_) | RegistryError::Cache(_) | RegistryError::DeadlineExceeded => {
                ErrorKind::Transient
            }
            RegistryError::Fatal(_) | RegistryError::Serialization(_) => ErrorKind::Fatal,
        }
    }
}

/// Coarse classification of [`RegistryError`], per the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Transient,
    Fatal,
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

impl From<semver::Error> for RegistryError {
    fn from(err: semver::Error) -> Self {
        RegistryError::InvalidVersion(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Transient(err.to_string())
    }
}
