//! Customer domain errors

use thiserror::Error;

/// Errors that can occur in the customer domain
#[derive(Debug, Error)]
pub enum CustomerError {
    /// Customer with the given ID or code was not found
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// A customer with the same code already exists
    #[error("Duplicate customer code: {0}")]
    DuplicateCode(String),

    /// Communication log not found
    #[error("Communication log not found: {0}")]
    CommunicationNotFound(String),

    /// Invalid customer data provided
    #[error("Invalid customer data: {0}")]
    InvalidData(String),

    /// Operation on a soft-deleted record
    #[error("Record has been deleted: {0}")]
    Deleted(String),
}
