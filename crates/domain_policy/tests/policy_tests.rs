//! Unit tests for the Policy domain
//!
//! Tests cover policy creation, renewal windows, payment frequencies and the
//! claim workflow.

use chrono::NaiveDate;
use core_kernel::{CustomerId, PolicyId, PolicyTypeId};
use domain_policy::{
    ClaimStatus, ClaimType, PaymentFrequency, Policy, PolicyClaim, PolicyError, PolicyStatus,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a basic test policy
fn create_test_policy() -> Policy {
    Policy::new(
        "MOT-2024-0001",
        CustomerId::new(),
        PolicyTypeId::new(),
        date(2024, 1, 1),
        date(2024, 12, 31),
        dec!(18000),
        dec!(600000),
    )
    .unwrap()
}

fn create_test_claim() -> PolicyClaim {
    PolicyClaim::submit(
        PolicyId::new(),
        ClaimType::Health,
        dec!(75000),
        date(2024, 5, 2),
        date(2024, 5, 4),
    )
    .unwrap()
}

mod policy_creation {
    use super::*;

    #[test]
    fn test_new_policy_is_active_yearly() {
        let policy = create_test_policy();
        assert_eq!(policy.status, PolicyStatus::Active);
        assert_eq!(policy.payment_frequency, PaymentFrequency::Yearly);
        assert!(policy.is_active());
    }

    #[test]
    fn test_negative_premium_rejected() {
        let result = Policy::new(
            "X",
            CustomerId::new(),
            PolicyTypeId::new(),
            date(2024, 1, 1),
            date(2025, 1, 1),
            dec!(-1),
            dec!(1000),
        );
        assert!(matches!(result, Err(PolicyError::Validation(_))));
    }

    #[test]
    fn test_installment_count_by_frequency() {
        let policy = create_test_policy();
        assert_eq!(policy.installment_count(), 1);
        assert_eq!(policy.clone().with_frequency(PaymentFrequency::Monthly).installment_count(), 12);
        assert_eq!(policy.clone().with_frequency(PaymentFrequency::Quarterly).installment_count(), 4);
        assert_eq!(policy.with_frequency(PaymentFrequency::HalfYearly).installment_count(), 2);
    }

    #[test]
    fn test_frequency_text() {
        assert_eq!(PaymentFrequency::HalfYearly.to_string(), "half_yearly");
        assert_eq!("Yearly".parse::<PaymentFrequency>().unwrap(), PaymentFrequency::Yearly);
    }
}

mod renewal_window {
    use super::*;

    #[test]
    fn test_far_from_expiry_not_due() {
        let policy = create_test_policy();
        assert_eq!(policy.days_to_expiry(date(2024, 6, 1)), 213);
        assert!(!policy.is_due_for_renewal(date(2024, 6, 1)));
    }

    #[test]
    fn test_exactly_thirty_days_is_due() {
        let policy = create_test_policy();
        assert!(policy.is_due_for_renewal(date(2024, 12, 1)));
    }

    proptest! {
        #[test]
        fn prop_due_matches_window(offset in -400i64..400) {
            let policy = create_test_policy();
            let today = policy.end_date - chrono::Duration::days(offset);
            prop_assert_eq!(policy.days_to_expiry(today), offset);
            prop_assert_eq!(policy.is_due_for_renewal(today), offset <= 30);
        }
    }
}

mod claim_workflow {
    use super::*;

    #[test]
    fn test_full_happy_path() {
        let mut claim = create_test_claim();
        claim.start_review().unwrap();
        claim.approve(dec!(70000)).unwrap();
        claim.settle().unwrap();

        assert_eq!(claim.status, ClaimStatus::Settled);
        assert_eq!(claim.approved_amount, Some(dec!(70000)));
        assert!(claim.processing_days().is_some());
    }

    #[test]
    fn test_approve_more_than_claimed_fails() {
        let mut claim = create_test_claim();
        claim.start_review().unwrap();
        let err = claim.approve(dec!(80000)).unwrap_err();
        assert!(matches!(err, PolicyError::ApprovedAmountExceedsClaim { .. }));
        assert_eq!(claim.status, ClaimStatus::UnderReview);
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut claim = create_test_claim();
        claim.start_review().unwrap();
        assert!(claim.reject("  ").is_err());
        claim.reject("Pre-existing condition").unwrap();
        assert_eq!(claim.status, ClaimStatus::Rejected);
        assert!(claim.status.is_decided());
        assert!(!claim.status.is_approved());
    }

    #[test]
    fn test_withdraw_from_submitted_and_review() {
        let mut a = create_test_claim();
        a.withdraw().unwrap();
        assert_eq!(a.status, ClaimStatus::Withdrawn);

        let mut b = create_test_claim();
        b.start_review().unwrap();
        b.withdraw().unwrap();
        assert!(b.settle().is_err());
    }

    #[test]
    fn test_incident_after_claim_rejected() {
        let result = PolicyClaim::submit(
            PolicyId::new(),
            ClaimType::Travel,
            dec!(100),
            date(2024, 5, 5),
            date(2024, 5, 4),
        );
        assert!(result.is_err());
    }
}
