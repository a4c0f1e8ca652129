//! Customer entity
//!
//! A customer carries a handful of denormalised portfolio figures
//! (`total_policies`, `total_premium`, `first_policy_date`) that are
//! recomputed from the customer's policies by [`Customer::update_metrics`],
//! and a `last_contact_date` maintained from the communication log.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{string_enum, CustomerId};

/// Lifecycle status of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Prospect,
    Lapsed,
}

string_enum!(CustomerStatus, "customer status", {
    Active => "active",
    Inactive => "inactive",
    Prospect => "prospect",
    Lapsed => "lapsed",
});

/// Service priority assigned to a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerPriority {
    Low,
    Medium,
    High,
}

string_enum!(CustomerPriority, "customer priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Customer value profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerProfile {
    Normal,
    /// High net-worth individual
    Hni,
}

string_enum!(CustomerProfile, "customer profile", {
    Normal => "normal",
    Hni => "hni",
});

/// A policyholder
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Customer {
    pub id: CustomerId,
    /// Human-facing customer code, unique across customers
    #[validate(length(min = 1, max = 50))]
    pub customer_code: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub priority: CustomerPriority,
    pub profile: CustomerProfile,
    pub first_policy_date: Option<NaiveDate>,
    pub total_policies: u32,
    pub total_premium: Decimal,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a policy that customer metrics are computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub premium_amount: Decimal,
    pub start_date: NaiveDate,
    pub is_active: bool,
    pub is_deleted: bool,
}

/// Outcome of a metrics refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsUpdate {
    pub old_count: u32,
    pub new_count: u32,
}

impl Customer {
    /// Creates a new active customer with a generated code
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let id = CustomerId::new_v7();
        let now = Utc::now();
        Self {
            customer_code: Self::generate_code(&id),
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            status: CustomerStatus::Active,
            priority: CustomerPriority::Medium,
            profile: CustomerProfile::Normal,
            first_policy_date: None,
            total_policies: 0,
            total_premium: Decimal::ZERO,
            last_contact_date: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derives a customer code from the identifier
    pub fn generate_code(id: &CustomerId) -> String {
        let simple = id.as_uuid().simple().to_string();
        format!("CUST-{}", simple[simple.len() - 8..].to_uppercase())
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        full.trim().to_string()
    }

    /// Recomputes the portfolio figures from the customer's policies
    ///
    /// Deleted policies are ignored. `total_policies` counts the remaining
    /// policies, `total_premium` sums premiums of active ones, and
    /// `first_policy_date` is the earliest start date.
    pub fn update_metrics(&mut self, policies: &[PolicySnapshot]) -> MetricsUpdate {
        let old_count = self.total_policies;
        let live: Vec<&PolicySnapshot> = policies.iter().filter(|p| !p.is_deleted).collect();

        self.total_policies = live.len() as u32;
        self.total_premium = live
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.premium_amount)
            .sum();
        self.first_policy_date = live.iter().map(|p| p.start_date).min();
        self.updated_at = Utc::now();

        MetricsUpdate {
            old_count,
            new_count: self.total_policies,
        }
    }

    /// Whole years between the first policy and `today`
    pub fn years_as_customer(&self, today: NaiveDate) -> i64 {
        self.first_policy_date
            .map(|first| (today - first).num_days().max(0) / 365)
            .unwrap_or(0)
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.status = CustomerStatus::Inactive;
        self.updated_at = Utc::now();
    }
}
