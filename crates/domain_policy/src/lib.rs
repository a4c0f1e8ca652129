//! Policy Domain
//!
//! Policies are the contracts whose renewals the system tracks. This crate
//! holds the policy catalogue (`PolicyType`), the policy record with its
//! renewal-due rules, and policy claims with their review workflow.
//!
//! # Claim Lifecycle
//!
//! ```text
//! Submitted -> UnderReview -> Approved -> Settled
//!          \              \-> Rejected
//!           \-> Withdrawn  \-> Withdrawn
//! ```

pub mod policy_type;
pub mod policy;
pub mod claim;
pub mod error;

pub use policy_type::PolicyType;
pub use policy::{Policy, PolicyStatus, PaymentFrequency, RENEWAL_WINDOW_DAYS};
pub use claim::{PolicyClaim, ClaimType, ClaimStatus};
pub use error::PolicyError;
