//! Cross-domain workflows
//!
//! A policy coming due, its renewal case, the installment schedule and the
//! payments collected against it, exercised across the domain crates
//! without a database.

use chrono::Duration;
use rust_decimal_macros::dec;

use domain_customer::PolicySnapshot;
use domain_hierarchy::{build_tree, ensure_no_cycle, HierarchyError, HierarchyStats, UnitType};
use domain_policy::{PaymentFrequency, PolicyStatus};
use domain_renewal::{
    case_payment_state, link_payment, mark_overdue, plan_installments, InstallmentStatus,
    PaymentStatus, RenewalPaymentStatus, RenewalStatus,
};
use test_utils::{
    assert_err_variant, assert_installment_count, assert_installments_ordered,
    assert_installments_sum, CustomerBuilder, HierarchyUnitBuilder, PaymentBuilder, PolicyBuilder,
    RenewalCaseBuilder, TemporalFixtures,
};

mod renewal_collection {
    use super::*;

    #[test]
    fn test_due_policy_to_fully_paid_case() {
        let customer = CustomerBuilder::new().build();
        let policy = PolicyBuilder::new()
            .for_customer(customer.id)
            .with_premium(dec!(1000))
            .with_frequency(PaymentFrequency::HalfYearly)
            .build();
        assert!(policy.is_due_for_renewal(TemporalFixtures::in_renewal_window()));

        let mut case = RenewalCaseBuilder::new().for_policy(&policy).build();
        case.assign("agent-12").unwrap();
        assert_eq!(case.status, RenewalStatus::Assigned);

        let mut plan = plan_installments(&policy, &case, policy.end_date).unwrap();
        assert_installments_sum(&plan, dec!(1000));
        assert_installments_ordered(&plan);

        let first = PaymentBuilder::new()
            .for_case(&case)
            .with_amount(dec!(500))
            .completed()
            .build();
        let second = PaymentBuilder::new()
            .for_case(&case)
            .with_amount(dec!(500))
            .paid_at(TemporalFixtures::payment_time() + Duration::days(180))
            .completed()
            .build();

        assert!(link_payment(&mut plan, &first).is_some());
        assert!(link_payment(&mut plan, &second).is_some());
        assert_installment_count(&plan, InstallmentStatus::Paid, 2);

        let state = case_payment_state([&first, &second], None);
        state.apply(&mut case);
        assert_eq!(case.payment_status, RenewalPaymentStatus::Success);
        assert_eq!(case.payment_date, Some(second.payment_date));

        case.set_status(RenewalStatus::Renewed).unwrap();
        assert!(case.is_closed());
    }

    #[test]
    fn test_failed_latest_payment_marks_case_failed() {
        let case = RenewalCaseBuilder::new().build();
        let ok = PaymentBuilder::new().for_case(&case).completed().build();
        let bounced = PaymentBuilder::new()
            .for_case(&case)
            .paid_at(TemporalFixtures::payment_time() + Duration::days(1))
            .with_status(PaymentStatus::Failed)
            .build();

        let state = case_payment_state([&ok, &bounced], None);
        assert_eq!(state.payment_status, RenewalPaymentStatus::Failed);

        let state = case_payment_state([&ok, &bounced], Some(bounced.id));
        assert_eq!(state.payment_status, RenewalPaymentStatus::Success);
    }

    #[test]
    fn test_unpaid_installments_go_overdue() {
        let policy = PolicyBuilder::new()
            .with_frequency(PaymentFrequency::Quarterly)
            .build();
        let case = RenewalCaseBuilder::new().for_policy(&policy).build();
        let mut plan = plan_installments(&policy, &case, policy.end_date).unwrap();

        let paid = PaymentBuilder::new()
            .for_case(&case)
            .with_amount(plan[0].amount_due)
            .completed()
            .build();
        link_payment(&mut plan, &paid);

        let after_second_due = plan[1].due_date + Duration::days(1);
        assert_eq!(mark_overdue(&mut plan, after_second_due), 1);
        assert_installment_count(&plan, InstallmentStatus::Overdue, 1);
        assert_installment_count(&plan, InstallmentStatus::Pending, 2);
    }

    #[test]
    fn test_customer_metrics_ignore_cancelled_premium() {
        let mut customer = CustomerBuilder::new().build();
        let active = PolicyBuilder::new().for_customer(customer.id).with_premium(dec!(300)).build();
        let cancelled = PolicyBuilder::new()
            .for_customer(customer.id)
            .with_premium(dec!(700))
            .with_status(PolicyStatus::Cancelled)
            .build();

        let snapshots: Vec<PolicySnapshot> = [&active, &cancelled]
            .iter()
            .map(|p| PolicySnapshot {
                premium_amount: p.premium_amount,
                start_date: p.start_date,
                is_active: p.is_active(),
                is_deleted: p.is_deleted,
            })
            .collect();

        let update = customer.update_metrics(&snapshots);
        assert_eq!(update.new_count, 2);
        assert_eq!(customer.total_premium, dec!(300));
    }
}

mod organisation {
    use super::*;

    #[test]
    fn test_tree_stats_and_cycle_guard() {
        let region = HierarchyUnitBuilder::new("North", UnitType::Region).with_target(100).build();
        let state = HierarchyUnitBuilder::new("Punjab", UnitType::State).under(region.id).build();
        let branch = HierarchyUnitBuilder::new("Amritsar", UnitType::Branch)
            .under(state.id)
            .with_target(25)
            .build();
        let units = vec![branch.clone(), region.clone(), state.clone()];

        let tree = build_tree(&units);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].unit.id, region.id);
        assert_eq!(tree[0].children[0].children[0].unit.id, branch.id);

        let stats = HierarchyStats::compute(&units);
        assert_eq!(stats.total_units, 3);
        assert_eq!(stats.total_target_cases, 125);
        assert_eq!(stats.by_parent.get("root"), Some(&1));

        assert_err_variant!(
            ensure_no_cycle(&units, region.id, Some(branch.id)),
            HierarchyError::Cycle { .. }
        );
    }
}
