//! Policy domain errors

use thiserror::Error;

/// Errors that can occur in the policy domain
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Invalid state transition attempted
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    /// Policy not found
    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    /// Policy type not found
    #[error("Policy type not found: {0}")]
    PolicyTypeNotFound(String),

    /// Claim not found
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Approved amount exceeds the claimed amount
    #[error("Approved amount {approved} exceeds claim amount {claimed}")]
    ApprovedAmountExceedsClaim {
        approved: String,
        claimed: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PolicyError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PolicyError::Validation(message.into())
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        PolicyError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
