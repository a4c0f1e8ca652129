//! Policy catalogue

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::PolicyTypeId;

use crate::error::PolicyError;

/// A product line policies are sold under (motor, health, term life...)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PolicyType {
    pub id: PolicyTypeId,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Short unique code, stored upper case
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub description: Option<String>,
    /// Base premium rate as a percentage of sum assured
    pub base_premium_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyType {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        base_premium_rate: Decimal,
    ) -> Result<Self, PolicyError> {
        if base_premium_rate.is_sign_negative() {
            return Err(PolicyError::validation("base premium rate cannot be negative"));
        }
        let code = code.into().trim().to_uppercase();
        if code.is_empty() {
            return Err(PolicyError::MissingRequiredField("code".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: PolicyTypeId::new_v7(),
            name: name.into(),
            code,
            description: None,
            base_premium_rate,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Indicative annual premium for a sum assured at the base rate
    pub fn indicative_premium(&self, sum_assured: Decimal) -> Decimal {
        (sum_assured * self.base_premium_rate / Decimal::ONE_HUNDRED).round_dp(2)
    }
}
