//! Claims DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{CustomerId, PolicyId};
use domain_policy::{ClaimStatus, ClaimType};

#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    pub policy_id: Option<PolicyId>,
    pub customer_id: Option<CustomerId>,
    pub status: Option<ClaimStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitClaimRequest {
    pub policy_id: PolicyId,
    pub claim_type: ClaimType,
    pub claim_amount: Decimal,
    pub incident_date: NaiveDate,
    /// Defaults to today
    pub claim_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClaimStatusRequest {
    pub status: ClaimStatus,
    /// Required when approving
    pub approved_amount: Option<Decimal>,
    /// Required when rejecting
    #[validate(length(min = 1, max = 1000))]
    pub rejection_reason: Option<String>,
}
