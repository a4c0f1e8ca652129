//! Customer Domain
//!
//! Customers are the policyholders whose renewals the system manages. This
//! crate owns the customer record, the log of every communication sent to or
//! received from a customer, and the rule that keeps a customer's
//! `last_contact_date` in step with that log.
//!
//! # Contact tracking
//!
//! `last_contact_date` is a denormalised value: it always equals the newest
//! `communication_date` among the customer's non-deleted communication logs.
//! Writers call [`contact::latest_contact_date`] after any log change and
//! persist the result in the same transaction as the change.

pub mod customer;
pub mod communication;
pub mod contact;
pub mod validation;
pub mod error;

pub use customer::{
    Customer, CustomerStatus, CustomerPriority, CustomerProfile, MetricsUpdate, PolicySnapshot,
};
pub use communication::{CommunicationLog, CommunicationChannel, CommunicationOutcome};
pub use contact::latest_contact_date;
pub use validation::{CustomerValidator, ValidationResult};
pub use error::CustomerError;
