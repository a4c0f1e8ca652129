//! Property-Based Test Generators
//!
//! proptest strategies for renewal amounts, policy terms and payment
//! frequencies, plus `fake`-backed helpers for realistic-looking records.

use chrono::{Duration, NaiveDate};
use core_kernel::{CustomerId, PolicyId};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_customer::Customer;
use domain_policy::PaymentFrequency;

/// Strategy for payment frequencies
pub fn frequency_strategy() -> impl Strategy<Value = PaymentFrequency> {
    prop_oneof![
        Just(PaymentFrequency::Monthly),
        Just(PaymentFrequency::Quarterly),
        Just(PaymentFrequency::HalfYearly),
        Just(PaymentFrequency::Yearly),
    ]
}

/// Strategy for positive amounts with two decimal places, 0.01 to 10,000,000.00
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Strategy for calendar dates between 2020 and the end of 2029
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650i64).prop_map(|days| {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN) + Duration::days(days)
    })
}

/// Strategy for policy terms as `(start, end)` with `end` after `start`
pub fn term_strategy() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (date_strategy(), 1i64..3660i64).prop_map(|(start, length)| (start, start + Duration::days(length)))
}

pub fn customer_id_strategy() -> impl Strategy<Value = CustomerId> {
    any::<[u8; 16]>().prop_map(|bytes| CustomerId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

pub fn policy_id_strategy() -> impl Strategy<Value = PolicyId> {
    any::<[u8; 16]>().prop_map(|bytes| PolicyId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for manager ids in the `mgr-NNN` form
pub fn manager_id_strategy() -> impl Strategy<Value = String> {
    (0u32..1000u32).prop_map(|n| format!("mgr-{:03}", n))
}

/// A customer with a fake name and email
pub fn fake_customer() -> Customer {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    let email: String = SafeEmail().fake();
    Customer::new(first, last).with_email(email)
}

/// `count` fake customers
pub fn fake_customers(count: usize) -> Vec<Customer> {
    (0..count).map(|_| fake_customer()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    proptest! {
        #[test]
        fn amounts_are_positive_with_two_places(amount in amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() <= 2);
        }

        #[test]
        fn terms_end_after_start((start, end) in term_strategy()) {
            prop_assert!(end > start);
        }

        #[test]
        fn manager_ids_are_valid(id in manager_id_strategy()) {
            prop_assert!(domain_hierarchy::is_valid_manager_id(&id));
        }

        #[test]
        fn frequencies_split_a_year(frequency in frequency_strategy()) {
            prop_assert_eq!(12 % frequency.installment_count(), 0);
        }
    }

    #[test]
    fn test_fake_customers_validate() {
        for customer in fake_customers(10) {
            assert!(customer.validate().is_ok(), "{:?}", customer.email);
            assert!(!customer.first_name.is_empty());
        }
    }
}
