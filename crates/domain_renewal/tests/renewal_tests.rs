//! Tests for domain_renewal

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CustomerId, PolicyTypeId};
use domain_policy::{PaymentFrequency, Policy};
use domain_renewal::{
    case_payment_state, link_payment, plan_installments, CustomerPayment, InstallmentStatus,
    PaymentMode, PaymentStatus, RenewalCase, RenewalPaymentStatus, RenewalStatus,
};

fn policy(frequency: PaymentFrequency, premium: Decimal) -> Policy {
    Policy::new(
        "HLT-0042",
        CustomerId::new(),
        PolicyTypeId::new(),
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        premium,
        dec!(1000000),
    )
    .unwrap()
    .with_frequency(frequency)
}

fn payment_for(case: &RenewalCase, days_ago: i64, status: PaymentStatus) -> CustomerPayment {
    let at = Utc::now() - Duration::days(days_ago);
    CustomerPayment::new(case.customer_id, dec!(2500), at, at.date_naive(), PaymentMode::CreditCard)
        .unwrap()
        .for_case(case.id)
        .with_status(status)
}

// ============================================================================
// Payment status sync
// ============================================================================

mod payment_sync {
    use super::*;

    #[test]
    fn test_completed_payment_marks_case_success() {
        let p = policy(PaymentFrequency::Yearly, dec!(10000));
        let mut case = RenewalCase::open(p.id, p.customer_id, "BATCH-A", dec!(10000)).unwrap();
        let payment = payment_for(&case, 0, PaymentStatus::Completed);

        case_payment_state(&[payment.clone()], None).apply(&mut case);

        assert_eq!(case.payment_status, RenewalPaymentStatus::Success);
        assert_eq!(case.payment_date, Some(payment.payment_date));
    }

    #[test]
    fn test_soft_deleting_latest_reverts_to_previous() {
        let p = policy(PaymentFrequency::Yearly, dec!(10000));
        let mut case = RenewalCase::open(p.id, p.customer_id, "BATCH-A", dec!(10000)).unwrap();
        let failed = payment_for(&case, 5, PaymentStatus::Failed);
        let mut completed = payment_for(&case, 1, PaymentStatus::Completed);

        let payments = vec![failed.clone(), completed.clone()];
        case_payment_state(&payments, None).apply(&mut case);
        assert_eq!(case.payment_status, RenewalPaymentStatus::Success);

        case_payment_state(&payments, Some(completed.id)).apply(&mut case);
        assert_eq!(case.payment_status, RenewalPaymentStatus::Failed);

        completed.soft_delete();
        let state = case_payment_state(&[failed, completed], None);
        assert_eq!(state.payment_status, RenewalPaymentStatus::Failed);
    }

    #[test]
    fn test_removing_all_payments_returns_to_pending() {
        let p = policy(PaymentFrequency::Yearly, dec!(10000));
        let mut case = RenewalCase::open(p.id, p.customer_id, "BATCH-A", dec!(10000)).unwrap();
        let only = payment_for(&case, 0, PaymentStatus::Refunded);
        case_payment_state(&[only.clone()], None).apply(&mut case);
        assert_eq!(case.payment_status, RenewalPaymentStatus::Failed);

        case_payment_state(&[only.clone()], Some(only.id)).apply(&mut case);
        assert_eq!(case.payment_status, RenewalPaymentStatus::Pending);
    }
}

// ============================================================================
// Renewal case workflow
// ============================================================================

mod case_workflow {
    use super::*;

    #[test]
    fn test_assign_sets_status() {
        let p = policy(PaymentFrequency::Yearly, dec!(8000));
        let mut case = RenewalCase::open(p.id, p.customer_id, "BATCH-B", dec!(8000)).unwrap();
        case.assign("agent.sharma").unwrap();
        assert_eq!(case.status, RenewalStatus::Assigned);
        assert_eq!(case.assigned_to.as_deref(), Some("agent.sharma"));
    }

    #[test]
    fn test_every_closed_status_is_sticky() {
        let p = policy(PaymentFrequency::Yearly, dec!(8000));
        for status in RenewalStatus::ALL.iter().filter(|s| s.is_closed()) {
            let mut case = RenewalCase::open(p.id, p.customer_id, "BATCH-B", dec!(8000)).unwrap();
            case.set_status(*status).unwrap();
            assert!(case.set_status(RenewalStatus::Pending).is_err(), "{status}");
        }
    }
}

// ============================================================================
// Installments
// ============================================================================

mod installments {
    use super::*;

    #[test]
    fn test_successive_payments_fill_schedule_in_order() {
        let p = policy(PaymentFrequency::Quarterly, dec!(10000));
        let case = RenewalCase::open(p.id, p.customer_id, "BATCH-C", dec!(10000)).unwrap();
        let mut plan = plan_installments(&p, &case, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()).unwrap();

        for days_ago in [3, 2] {
            let payment = payment_for(&case, days_ago, PaymentStatus::Completed);
            assert!(link_payment(&mut plan, &payment).is_some());
        }

        let paid: Vec<u32> = plan
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .map(|i| i.installment_number)
            .collect();
        assert_eq!(paid, vec![1, 2]);
    }

    #[test]
    fn test_mismatched_policy_rejected() {
        let p = policy(PaymentFrequency::Monthly, dec!(1200));
        let other = policy(PaymentFrequency::Monthly, dec!(1200));
        let case = RenewalCase::open(other.id, other.customer_id, "BATCH-C", dec!(1200)).unwrap();
        assert!(plan_installments(&p, &case, Utc::now().date_naive()).is_err());
    }

    proptest! {
        #[test]
        fn prop_schedule_sums_to_renewal_amount(
            cents in 100i64..100_000_000,
            freq in prop_oneof![
                Just(PaymentFrequency::Monthly),
                Just(PaymentFrequency::Quarterly),
                Just(PaymentFrequency::HalfYearly),
                Just(PaymentFrequency::Yearly),
            ],
        ) {
            let amount = Decimal::new(cents, 2);
            let p = policy(freq, amount);
            let case = RenewalCase::open(p.id, p.customer_id, "PROP", amount).unwrap();
            let plan = plan_installments(&p, &case, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()).unwrap();

            prop_assert_eq!(plan.len() as u32, freq.installment_count());
            let total: Decimal = plan.iter().map(|i| i.amount_due).sum();
            prop_assert_eq!(total, amount);
            prop_assert!(plan.windows(2).all(|w| w[0].due_date < w[1].due_date));
            prop_assert!(plan.windows(2).all(|w| w[0].amount_due <= w[1].amount_due));
        }
    }
}
