//! Renewal Domain
//!
//! A renewal case tracks one policy through its renewal: assignment to an
//! agent, contact attempts, and collection of the renewal premium. Payments
//! against a case drive the case's payment status, and a case's premium may
//! be split into installments following the policy's payment frequency.
//!
//! # Payment status
//!
//! The case's `payment_status` is derived, never set by hand. After any
//! payment write the caller runs [`sync::case_payment_state`] over the case's
//! payments and stores the result in the same transaction.

pub mod case;
pub mod payment;
pub mod sync;
pub mod installment;
pub mod dashboard;
pub mod error;

pub use case::{
    RenewalCase, RenewalStatus, CasePriority, RenewalPaymentStatus, RenewalChannel, ChannelSource,
};
pub use payment::{CustomerPayment, PaymentStatus, PaymentMode};
pub use sync::{case_payment_state, CasePaymentState};
pub use installment::{
    Installment, InstallmentStatus, plan_installments, link_payment, mark_overdue,
};
pub use dashboard::DashboardSummary;
pub use error::RenewalError;
