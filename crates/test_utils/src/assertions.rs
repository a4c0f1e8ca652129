//! Custom Test Assertions
//!
//! Assertion helpers for amounts and installment schedules with messages
//! that name the values involved.

use rust_decimal::Decimal;

use domain_renewal::{Installment, InstallmentStatus};

/// Asserts that two decimals differ by at most `tolerance`
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts that an amount carries at most two decimal places
pub fn assert_currency_precision(amount: Decimal) {
    assert!(
        amount.normalize().scale() <= 2,
        "Amount {} has more than two decimal places",
        amount
    );
}

/// Asserts that a schedule's amounts add up to `total` exactly
pub fn assert_installments_sum(installments: &[Installment], total: Decimal) {
    let sum: Decimal = installments.iter().map(|i| i.amount_due).sum();
    assert_eq!(
        sum, total,
        "Installments sum to {} but the renewal amount is {}",
        sum, total
    );
}

/// Asserts that a schedule is numbered 1..=n with strictly increasing due dates
pub fn assert_installments_ordered(installments: &[Installment]) {
    for (index, installment) in installments.iter().enumerate() {
        assert_eq!(
            installment.installment_number as usize,
            index + 1,
            "Installment at position {} is numbered {}",
            index,
            installment.installment_number
        );
    }
    for pair in installments.windows(2) {
        assert!(
            pair[0].due_date < pair[1].due_date,
            "Installment {} is due {} but installment {} is due {}",
            pair[0].installment_number,
            pair[0].due_date,
            pair[1].installment_number,
            pair[1].due_date
        );
    }
}

/// Asserts how many installments of a schedule are in `status`
pub fn assert_installment_count(installments: &[Installment], status: InstallmentStatus, expected: usize) {
    let count = installments.iter().filter(|i| i.status == status).count();
    assert_eq!(
        count, expected,
        "Expected {} {} installments, found {}",
        expected, status, count
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{PolicyBuilder, RenewalCaseBuilder};
    use crate::fixtures::TemporalFixtures;
    use domain_policy::PaymentFrequency;
    use domain_renewal::{plan_installments, RenewalError};
    use rust_decimal_macros::dec;

    fn monthly_plan(amount: Decimal) -> Vec<Installment> {
        let policy = PolicyBuilder::new()
            .with_premium(amount)
            .with_frequency(PaymentFrequency::Monthly)
            .build();
        let case = RenewalCaseBuilder::new().for_policy(&policy).build();
        plan_installments(&policy, &case, TemporalFixtures::policy_end()).unwrap()
    }

    #[test]
    fn test_schedule_assertions_pass() {
        let plan = monthly_plan(dec!(1000));
        assert_installments_sum(&plan, dec!(1000));
        assert_installments_ordered(&plan);
        assert_installment_count(&plan, InstallmentStatus::Pending, 12);
        plan.iter().for_each(|i| assert_currency_precision(i.amount_due));
    }

    #[test]
    #[should_panic(expected = "Installments sum to")]
    fn test_sum_mismatch_panics() {
        let plan = monthly_plan(dec!(1000));
        assert_installments_sum(&plan, dec!(999.99));
    }

    #[test]
    #[should_panic(expected = "more than two decimal places")]
    fn test_precision_panics() {
        assert_currency_precision(dec!(10.005));
    }

    #[test]
    fn test_assert_decimal_approx_eq() {
        assert_decimal_approx_eq(dec!(100.001), dec!(100.002), dec!(0.01));
    }

    #[test]
    fn test_err_variant_macro() {
        let result: Result<(), RenewalError> = Err(RenewalError::InvalidAmount("-1".into()));
        assert_err_variant!(result, RenewalError::InvalidAmount(_));
    }
}
