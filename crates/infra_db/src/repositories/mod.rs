//! Repository implementations for domain entities
//!
//! Each repository owns the SQL for one table family and maps rows onto
//! domain types. Writes that keep derived fields in step (a customer's last
//! contact date, a renewal case's payment status) run in a single
//! transaction with the write that triggers them.

pub mod customer;
pub mod communication;
pub mod policy;
pub mod claim;
pub mod renewal;
pub mod payment;
pub mod hierarchy;

pub use customer::{CustomerFilter, CustomerRepository};
pub use communication::{CommunicationFilter, CommunicationRepository};
pub use policy::{PolicyFilter, PolicyRepository};
pub use claim::{ClaimFilter, ClaimRepository};
pub use renewal::{CaseFilter, RenewalRepository};
pub use payment::{PaymentFilter, PaymentRepository};
pub use hierarchy::{HierarchyFilter, HierarchyRepository};
