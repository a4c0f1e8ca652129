//! Renewal case DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{CustomerId, PolicyId};
use domain_renewal::{
    CasePriority, ChannelSource, Installment, RenewalCase, RenewalChannel, RenewalStatus,
};

#[derive(Debug, Default, Deserialize)]
pub struct CaseQuery {
    pub status: Option<RenewalStatus>,
    pub priority: Option<CasePriority>,
    pub customer_id: Option<CustomerId>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseRequest {
    pub policy_id: PolicyId,
    #[validate(length(min = 1, max = 50))]
    pub batch_code: String,
    /// Defaults to the policy premium
    pub renewal_amount: Option<Decimal>,
    pub priority: Option<CasePriority>,
    pub channel: Option<RenewalChannel>,
    pub channel_source: Option<ChannelSource>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub assigned_to: Option<String>,
    /// First installment due date; defaults to the policy end date
    pub installments_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCaseRequest {
    #[validate(length(min = 1, max = 50))]
    pub batch_code: Option<String>,
    pub priority: Option<CasePriority>,
    pub channel: Option<RenewalChannel>,
    pub channel_source: Option<ChannelSource>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignCaseRequest {
    #[validate(length(min = 1, max = 100))]
    pub assigned_to: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCaseStatusRequest {
    pub status: RenewalStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordContactRequest {
    /// Defaults to now
    pub contacted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkOverdueQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct MarkOverdueResponse {
    pub as_of: NaiveDate,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct CaseWithInstallments {
    #[serde(flatten)]
    pub case: RenewalCase,
    pub installments: Vec<Installment>,
}
