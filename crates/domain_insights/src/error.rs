//! Insight errors

use thiserror::Error;

use core_kernel::{CustomerId, PortError};

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Invalid insight request: {0}")]
    Validation(String),

    #[error("Cached insight could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl InsightError {
    /// Maps a not-found from the source port onto the customer
    pub(crate) fn from_source(customer_id: CustomerId, error: PortError) -> Self {
        if error.is_not_found() {
            InsightError::CustomerNotFound(customer_id)
        } else {
            InsightError::Port(error)
        }
    }
}
