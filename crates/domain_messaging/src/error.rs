//! Messaging domain errors

use thiserror::Error;

use core_kernel::PortError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Email provider not found: {0}")]
    ProviderNotFound(String),

    /// Every provider was skipped or failed
    #[error("All email providers failed (attempted: {})", attempted.join(", "))]
    AllProvidersFailed {
        attempted: Vec<String>,
    },

    #[error("Transport error from {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: PortError,
    },

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] PortError),
}
