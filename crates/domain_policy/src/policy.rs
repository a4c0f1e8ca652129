//! Policy record
//!
//! A policy belongs to one customer and one policy type. Renewal tracking
//! only needs the term dates, premium and payment frequency; nominee and
//! agent details are carried for display.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{string_enum, CustomerId, PolicyId, PolicyTypeId};

use crate::error::PolicyError;

/// A policy is due for renewal when it expires within this many days
pub const RENEWAL_WINDOW_DAYS: i64 = 30;

/// Policy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Active,
    Expired,
    Cancelled,
    Pending,
    Suspended,
}

string_enum!(PolicyStatus, "policy status", {
    Active => "active",
    Expired => "expired",
    Cancelled => "cancelled",
    Pending => "pending",
    Suspended => "suspended",
});

/// How often the premium is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

string_enum!(PaymentFrequency, "payment frequency", {
    Monthly => "monthly",
    Quarterly => "quarterly",
    HalfYearly => "half_yearly",
    Yearly => "yearly",
});

impl PaymentFrequency {
    /// Number of payments per policy year
    pub fn installment_count(&self) -> u32 {
        match self {
            PaymentFrequency::Monthly => 12,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::HalfYearly => 2,
            PaymentFrequency::Yearly => 1,
        }
    }

    /// Months between consecutive payments
    pub fn months_between(&self) -> u32 {
        12 / self.installment_count()
    }

    /// Due date of the `index`-th payment (zero based) counted from `start`
    pub fn due_date(&self, start: NaiveDate, index: u32) -> NaiveDate {
        start
            .checked_add_months(Months::new(self.months_between() * index))
            .unwrap_or(start)
    }
}

/// An insurance policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Policy {
    pub id: PolicyId,
    #[validate(length(min = 1, max = 50))]
    pub policy_number: String,
    pub customer_id: CustomerId,
    pub policy_type_id: PolicyTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
    pub sum_assured: Decimal,
    pub status: PolicyStatus,
    pub payment_frequency: PaymentFrequency,
    pub nominee_name: Option<String>,
    pub nominee_relationship: Option<String>,
    pub agent_name: Option<String>,
    pub agent_code: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn new(
        policy_number: impl Into<String>,
        customer_id: CustomerId,
        policy_type_id: PolicyTypeId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        premium_amount: Decimal,
        sum_assured: Decimal,
    ) -> Result<Self, PolicyError> {
        if end_date <= start_date {
            return Err(PolicyError::validation("end date must be after start date"));
        }
        if premium_amount.is_sign_negative() || sum_assured.is_sign_negative() {
            return Err(PolicyError::validation("amounts cannot be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: PolicyId::new_v7(),
            policy_number: policy_number.into(),
            customer_id,
            policy_type_id,
            start_date,
            end_date,
            premium_amount,
            sum_assured,
            status: PolicyStatus::Active,
            payment_frequency: PaymentFrequency::Yearly,
            nominee_name: None,
            nominee_relationship: None,
            agent_name: None,
            agent_code: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.payment_frequency = frequency;
        self
    }

    /// Days until the end date; negative once expired
    pub fn days_to_expiry(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    /// True when the policy expires within [`RENEWAL_WINDOW_DAYS`]
    ///
    /// Already-expired policies count as due.
    pub fn is_due_for_renewal(&self, today: NaiveDate) -> bool {
        self.days_to_expiry(today) <= RENEWAL_WINDOW_DAYS
    }

    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active && !self.is_deleted
    }

    pub fn installment_count(&self) -> u32 {
        self.payment_frequency.installment_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy(end: NaiveDate) -> Policy {
        Policy::new(
            "POL-0001",
            CustomerId::new(),
            PolicyTypeId::new(),
            date(2023, 1, 1),
            end,
            dec!(12000),
            dec!(500000),
        )
        .unwrap()
    }

    #[test]
    fn test_due_for_renewal_boundary() {
        let today = date(2024, 1, 1);
        assert!(policy(date(2024, 1, 31)).is_due_for_renewal(today));
        assert!(!policy(date(2024, 2, 1)).is_due_for_renewal(today));
    }

    #[test]
    fn test_expired_policy_is_due() {
        let p = policy(date(2023, 12, 1));
        assert_eq!(p.days_to_expiry(date(2024, 1, 1)), -31);
        assert!(p.is_due_for_renewal(date(2024, 1, 1)));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let result = Policy::new(
            "POL-0002",
            CustomerId::new(),
            PolicyTypeId::new(),
            date(2024, 1, 1),
            date(2023, 1, 1),
            dec!(1),
            dec!(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_frequency_due_dates() {
        let start = date(2024, 1, 31);
        assert_eq!(PaymentFrequency::Monthly.due_date(start, 1), date(2024, 2, 29));
        assert_eq!(PaymentFrequency::Quarterly.due_date(start, 2), date(2024, 7, 31));
        assert_eq!(PaymentFrequency::HalfYearly.months_between(), 6);
        assert_eq!(PaymentFrequency::Yearly.due_date(start, 0), start);
    }
}
