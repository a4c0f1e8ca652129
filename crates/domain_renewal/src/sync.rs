//! Renewal case payment status derivation
//!
//! A case's `payment_status` follows its latest live payment. Writers call
//! [`case_payment_state`] after creating, updating or deleting a payment and
//! apply the result inside the same transaction. A soft delete passes the
//! payment being deleted as `excluding`.

use chrono::{DateTime, Utc};

use core_kernel::PaymentId;

use crate::case::{RenewalCase, RenewalPaymentStatus};
use crate::payment::{CustomerPayment, PaymentStatus};

impl From<PaymentStatus> for RenewalPaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Completed | PaymentStatus::Partial => RenewalPaymentStatus::Success,
            PaymentStatus::Failed
            | PaymentStatus::Cancelled
            | PaymentStatus::Refunded
            | PaymentStatus::Overdue => RenewalPaymentStatus::Failed,
            PaymentStatus::Pending | PaymentStatus::Processing => RenewalPaymentStatus::Pending,
        }
    }
}

/// What a case's payment fields should become
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasePaymentState {
    pub payment_status: RenewalPaymentStatus,
    /// Set when the latest payment is completed; `None` leaves the case's
    /// existing payment date untouched
    pub payment_date: Option<DateTime<Utc>>,
}

impl CasePaymentState {
    pub fn apply(&self, case: &mut RenewalCase) {
        case.payment_status = self.payment_status;
        if let Some(date) = self.payment_date {
            case.payment_date = Some(date);
        }
        case.updated_at = Utc::now();
    }
}

/// Derives the case payment state from the case's payments
///
/// The latest non-deleted payment by `payment_date` wins; with none left
/// the status falls back to pending.
pub fn case_payment_state<'a, I>(payments: I, excluding: Option<PaymentId>) -> CasePaymentState
where
    I: IntoIterator<Item = &'a CustomerPayment>,
{
    let latest = payments
        .into_iter()
        .filter(|p| !p.is_deleted)
        .filter(|p| Some(p.id) != excluding)
        .max_by_key(|p| (p.payment_date, p.created_at));

    match latest {
        Some(payment) => CasePaymentState {
            payment_status: payment.status.into(),
            payment_date: payment.is_completed().then_some(payment.payment_date),
        },
        None => CasePaymentState {
            payment_status: RenewalPaymentStatus::Pending,
            payment_date: None,
        },
    }
}
