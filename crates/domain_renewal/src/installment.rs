//! Installment schedules
//!
//! A renewal premium is split into one installment per payment period of
//! the policy's frequency. Amounts are rounded down to the cent and the
//! remainder lands on the last installment, so the schedule always sums to
//! the renewal amount.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, InstallmentId, PaymentId, RenewalCaseId};
use domain_policy::Policy;

use crate::case::RenewalCase;
use crate::error::RenewalError;
use crate::payment::CustomerPayment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Scheduled,
    Paid,
    Overdue,
    Cancelled,
}

string_enum!(InstallmentStatus, "installment status", {
    Pending => "pending",
    Scheduled => "scheduled",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

impl InstallmentStatus {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            InstallmentStatus::Pending | InstallmentStatus::Scheduled | InstallmentStatus::Overdue
        )
    }
}

/// One scheduled part-payment of a renewal premium
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub renewal_case_id: RenewalCaseId,
    /// 1-based position in the schedule
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub status: InstallmentStatus,
    pub payment_id: Option<PaymentId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builds the installment schedule for a case
pub fn plan_installments(
    policy: &Policy,
    case: &RenewalCase,
    start: NaiveDate,
) -> Result<Vec<Installment>, RenewalError> {
    if case.policy_id != policy.id {
        return Err(RenewalError::Planning(format!(
            "case {} does not belong to policy {}",
            case.case_number, policy.policy_number
        )));
    }
    if case.renewal_amount <= Decimal::ZERO {
        return Err(RenewalError::Planning("renewal amount must be positive".into()));
    }

    let frequency = policy.payment_frequency;
    let count = frequency.installment_count();
    let base = (case.renewal_amount / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let last = case.renewal_amount - base * Decimal::from(count - 1);
    let now = Utc::now();

    Ok((0..count)
        .map(|i| Installment {
            id: InstallmentId::new_v7(),
            renewal_case_id: case.id,
            installment_number: i + 1,
            due_date: frequency.due_date(start, i),
            amount_due: if i + 1 == count { last } else { base },
            status: InstallmentStatus::Pending,
            payment_id: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
        .collect())
}

/// Attaches a completed payment to the earliest open installment of its case
///
/// Returns the installment that was paid, if any.
pub fn link_payment(
    installments: &mut [Installment],
    payment: &CustomerPayment,
) -> Option<InstallmentId> {
    if !payment.is_completed() || payment.is_deleted {
        return None;
    }
    let case_id = payment.renewal_case_id?;
    if installments.iter().any(|i| i.payment_id == Some(payment.id)) {
        return None;
    }

    let target = installments
        .iter_mut()
        .filter(|i| i.renewal_case_id == case_id && i.status.is_open())
        .min_by_key(|i| i.installment_number)?;

    target.status = InstallmentStatus::Paid;
    target.payment_id = Some(payment.id);
    target.paid_at = Some(payment.payment_date);
    target.updated_at = Utc::now();
    Some(target.id)
}

/// Flags pending and scheduled installments past their due date
///
/// Returns how many changed.
pub fn mark_overdue(installments: &mut [Installment], today: NaiveDate) -> usize {
    let mut changed = 0;
    for installment in installments.iter_mut() {
        let waiting = matches!(
            installment.status,
            InstallmentStatus::Pending | InstallmentStatus::Scheduled
        );
        if waiting && installment.due_date < today {
            installment.status = InstallmentStatus::Overdue;
            installment.updated_at = Utc::now();
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentMode, PaymentStatus};
    use core_kernel::{CustomerId, PolicyTypeId};
    use domain_policy::PaymentFrequency;
    use rust_decimal_macros::dec;

    fn setup(frequency: PaymentFrequency, amount: Decimal) -> (Policy, RenewalCase) {
        let policy = Policy::new(
            "P-1",
            CustomerId::new(),
            PolicyTypeId::new(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            amount,
            dec!(100000),
        )
        .unwrap()
        .with_frequency(frequency);
        let case = RenewalCase::open(policy.id, policy.customer_id, "B1", amount).unwrap();
        (policy, case)
    }

    #[test]
    fn test_remainder_on_last() {
        let (policy, case) = setup(PaymentFrequency::Quarterly, dec!(1000));
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let plan = plan_installments(&policy, &case, start).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].amount_due, dec!(250));
        assert_eq!(plan[3].due_date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());

        let (policy, case) = setup(PaymentFrequency::Monthly, dec!(100));
        let plan = plan_installments(&policy, &case, start).unwrap();
        assert_eq!(plan[0].amount_due, dec!(8.33));
        assert_eq!(plan[11].amount_due, dec!(8.37));
    }

    #[test]
    fn test_link_payment_pays_earliest_open() {
        let (policy, case) = setup(PaymentFrequency::HalfYearly, dec!(1000));
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut plan = plan_installments(&policy, &case, start).unwrap();

        let payment = CustomerPayment::new(
            case.customer_id,
            dec!(500),
            Utc::now(),
            start,
            PaymentMode::NetBanking,
        )
        .unwrap()
        .for_case(case.id)
        .with_status(PaymentStatus::Completed);

        assert_eq!(link_payment(&mut plan, &payment), Some(plan[0].id));
        assert_eq!(link_payment(&mut plan, &payment), None);
        assert_eq!(plan[1].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_pending_payment_not_linked() {
        let (policy, case) = setup(PaymentFrequency::Yearly, dec!(1000));
        let mut plan = plan_installments(&policy, &case, Utc::now().date_naive()).unwrap();
        let payment = CustomerPayment::new(
            case.customer_id,
            dec!(1000),
            Utc::now(),
            Utc::now().date_naive(),
            PaymentMode::Cash,
        )
        .unwrap()
        .for_case(case.id);
        assert_eq!(link_payment(&mut plan, &payment), None);
    }

    #[test]
    fn test_mark_overdue() {
        let (policy, case) = setup(PaymentFrequency::Quarterly, dec!(400));
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut plan = plan_installments(&policy, &case, start).unwrap();
        plan[0].status = InstallmentStatus::Paid;
        let changed = mark_overdue(&mut plan, NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
        assert_eq!(changed, 2);
        assert_eq!(plan[0].status, InstallmentStatus::Paid);
        assert_eq!(plan[3].status, InstallmentStatus::Pending);
    }
}
