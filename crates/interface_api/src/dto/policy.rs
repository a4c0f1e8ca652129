//! Policy type and policy DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{CustomerId, PolicyTypeId};
use domain_policy::{PaymentFrequency, PolicyStatus};

#[derive(Debug, Default, Deserialize)]
pub struct PolicyTypeQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePolicyTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub base_premium_rate: Decimal,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePolicyTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub base_premium_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    pub customer_id: Option<CustomerId>,
    pub policy_type_id: Option<PolicyTypeId>,
    pub status: Option<PolicyStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DueForRenewalQuery {
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePolicyRequest {
    #[validate(length(min = 1, max = 50))]
    pub policy_number: String,
    pub customer_id: CustomerId,
    pub policy_type_id: PolicyTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
    pub sum_assured: Decimal,
    pub status: Option<PolicyStatus>,
    pub payment_frequency: Option<PaymentFrequency>,
    #[validate(length(max = 200))]
    pub nominee_name: Option<String>,
    #[validate(length(max = 100))]
    pub nominee_relationship: Option<String>,
    #[validate(length(max = 200))]
    pub agent_name: Option<String>,
    #[validate(length(max = 50))]
    pub agent_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePolicyRequest {
    pub policy_type_id: Option<PolicyTypeId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub premium_amount: Option<Decimal>,
    pub sum_assured: Option<Decimal>,
    pub status: Option<PolicyStatus>,
    pub payment_frequency: Option<PaymentFrequency>,
    #[validate(length(max = 200))]
    pub nominee_name: Option<String>,
    #[validate(length(max = 100))]
    pub nominee_relationship: Option<String>,
    #[validate(length(max = 200))]
    pub agent_name: Option<String>,
    #[validate(length(max = 50))]
    pub agent_code: Option<String>,
}
