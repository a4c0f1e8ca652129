//! Ports and Adapters Infrastructure
//!
//! Domain crates describe what they need from storage or from outside
//! vendors as port traits (`ProviderStore`, `InsightSource`, ...). Adapters
//! implement those traits: PostgreSQL repositories in `infra_db`, vendor
//! clients such as SendGrid or SMTP in `domain_messaging`, and in-memory
//! fakes in tests.
//!
//! ```text
//!        domain services ──► port traits ◄── adapters (postgres, http, smtp, mock)
//! ```
//!
//! All ports report failures as [`PortError`] so services can treat a
//! database outage and a vendor timeout the same way.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Failure reported by any port adapter
#[derive(Debug, Error)]
pub enum PortError {
    /// No row or remote record with this id
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A uniqueness rule or a state rule refused the write
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Database or vendor endpoint unreachable
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// Vendor rejected the credentials (bad API key, SMTP auth failure)
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// Vendor throttled the request
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
    },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Validation error with field information
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::RateLimited { .. }
                | PortError::ServiceUnavailable { .. }
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Supertrait of every port, so ports can sit behind `Arc<dyn ...>` in services
pub trait DomainPort: Send + Sync + 'static {}

/// Health of an adapter; email providers persist this as their health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    /// Reachable but slow or partially failing
    Degraded,
    /// Skipped by failover until a health check succeeds
    Unhealthy,
    /// Never checked
    Unknown,
}

crate::string_enum!(AdapterHealth, "health status", {
    Healthy => "healthy",
    Degraded => "degraded",
    Unhealthy => "unhealthy",
    Unknown => "unknown",
});

/// Outcome of one health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    /// Error text from the probe when it failed
    pub message: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Adapters that can probe their backend without side effects
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

impl From<crate::CoreError> for PortError {
    fn from(error: crate::CoreError) -> Self {
        match error {
            crate::CoreError::NotFound(message) => PortError::NotFound {
                entity_type: "entity".to_string(),
                id: message,
            },
            crate::CoreError::InvalidStateTransition(message) => PortError::Conflict { message },
            other => PortError::validation(other.to_string()),
        }
    }
}

impl HealthCheckResult {
    /// Builds a result stamped with the current time
    pub fn new(
        adapter_id: impl Into<String>,
        status: AdapterHealth,
        latency_ms: u64,
        message: Option<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status,
            latency_ms,
            message,
            checked_at: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}
