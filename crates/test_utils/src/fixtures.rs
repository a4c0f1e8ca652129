//! Pre-built Test Fixtures
//!
//! Fixed dates, amounts and identifiers shared across tests. Everything
//! here is deterministic so assertions can name exact values.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{CustomerId, HierarchyUnitId, PolicyId, PolicyTypeId, RenewalCaseId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for premium and payment amounts
pub struct AmountFixtures;

impl AmountFixtures {
    /// Yearly premium of the standard policy
    pub fn premium() -> Decimal {
        dec!(12000.00)
    }

    pub fn sum_assured() -> Decimal {
        dec!(500000.00)
    }

    /// An amount that does not split evenly into twelve installments
    pub fn uneven_premium() -> Decimal {
        dec!(1000.00)
    }

    /// Base premium rate of the standard policy type, as a percentage
    pub fn base_rate() -> Decimal {
        dec!(2.40)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard policy start date (Jan 1, 2024)
    pub fn policy_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Standard policy end date (Jan 1, 2025), also the renewal date
    pub fn policy_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    /// A day inside the 30-day renewal window of the standard policy
    pub fn in_renewal_window() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 15).unwrap()
    }

    /// A day well before the renewal window opens
    pub fn before_renewal_window() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// Payment timestamp inside the policy term
    pub fn payment_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 20, 10, 30, 0).unwrap()
    }

    /// Contact timestamp inside the policy term
    pub fn contact_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 10, 9, 0, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    pub fn policy_id() -> PolicyId {
        PolicyId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    pub fn policy_type_id() -> PolicyTypeId {
        PolicyTypeId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }

    pub fn case_id() -> RenewalCaseId {
        RenewalCaseId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440004").unwrap())
    }

    pub fn unit_id() -> HierarchyUnitId {
        HierarchyUnitId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440005").unwrap())
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn policy_number() -> &'static str {
        "POL-2024-000001"
    }

    pub fn policy_type_code() -> &'static str {
        "TERM"
    }

    pub fn batch_code() -> &'static str {
        "BATCH-2024-12"
    }

    pub fn email() -> &'static str {
        "asha.rao@example.com"
    }

    pub fn phone() -> &'static str {
        "+919876543210"
    }

    pub fn first_name() -> &'static str {
        "Asha"
    }

    pub fn last_name() -> &'static str {
        "Rao"
    }

    pub fn manager_id() -> &'static str {
        "mgr-001"
    }

    pub fn sender() -> &'static str {
        "renewals@example.com"
    }
}
