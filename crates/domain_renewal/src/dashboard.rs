//! Renewal dashboard figures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::case::{RenewalCase, RenewalStatus};
use crate::payment::CustomerPayment;

/// Headline numbers for the renewal dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_cases: u64,
    pub in_progress: u64,
    pub renewed: u64,
    pub pending_action: u64,
    pub failed: u64,
    pub renewal_amount_total: Decimal,
    pub payment_collected: Decimal,
    pub payment_pending: Decimal,
}

impl DashboardSummary {
    /// Builds the summary from aggregated figures, deriving the pending amount
    pub fn from_totals(
        total_cases: u64,
        in_progress: u64,
        renewed: u64,
        pending_action: u64,
        failed: u64,
        renewal_amount_total: Decimal,
        payment_collected: Decimal,
    ) -> Self {
        Self {
            total_cases,
            in_progress,
            renewed,
            pending_action,
            failed,
            renewal_amount_total,
            payment_collected,
            payment_pending: renewal_amount_total - payment_collected,
        }
    }

    /// Computes the summary from loaded cases and payments
    pub fn compute(cases: &[RenewalCase], payments: &[CustomerPayment]) -> Self {
        let count = |status: RenewalStatus| cases.iter().filter(|c| c.status == status).count() as u64;
        let collected = payments
            .iter()
            .filter(|p| !p.is_deleted && p.is_completed())
            .map(|p| p.amount)
            .sum();

        Self::from_totals(
            cases.len() as u64,
            count(RenewalStatus::InProgress),
            count(RenewalStatus::Renewed),
            count(RenewalStatus::PendingAction),
            count(RenewalStatus::Failed),
            cases.iter().map(|c| c.renewal_amount).sum(),
            collected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentMode, PaymentStatus};
    use chrono::Utc;
    use core_kernel::{CustomerId, PolicyId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_compute() {
        let mut a = RenewalCase::open(PolicyId::new(), CustomerId::new(), "B", dec!(1000)).unwrap();
        a.set_status(RenewalStatus::Renewed).unwrap();
        let b = RenewalCase::open(PolicyId::new(), CustomerId::new(), "B", dec!(500)).unwrap();
        let paid = CustomerPayment::new(a.customer_id, dec!(1000), Utc::now(), Utc::now().date_naive(), PaymentMode::Upi)
            .unwrap()
            .with_status(PaymentStatus::Completed);
        let pending = CustomerPayment::new(b.customer_id, dec!(500), Utc::now(), Utc::now().date_naive(), PaymentMode::Upi)
            .unwrap();

        let summary = DashboardSummary::compute(&[a, b], &[paid, pending]);
        assert_eq!(summary.total_cases, 2);
        assert_eq!(summary.renewed, 1);
        assert_eq!(summary.payment_collected, dec!(1000));
        assert_eq!(summary.payment_pending, dec!(500));
    }
}
