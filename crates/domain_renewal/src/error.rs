//! Renewal domain errors

use thiserror::Error;

/// Errors that can occur in the renewal domain
#[derive(Debug, Error)]
pub enum RenewalError {
    /// Renewal case not found
    #[error("Renewal case not found: {0}")]
    CaseNotFound(String),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// The case is in a closed status and cannot change
    #[error("Renewal case {case_number} is closed ({status})")]
    CaseClosed {
        case_number: String,
        status: String,
    },

    /// Invalid payment amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Installments cannot be planned for this case
    #[error("Installment planning failed: {0}")]
    Planning(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl RenewalError {
    pub fn validation(message: impl Into<String>) -> Self {
        RenewalError::Validation(message.into())
    }
}
