//! Customer payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{CustomerId, RenewalCaseId};
use domain_renewal::{PaymentMode, PaymentStatus};

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub customer_id: Option<CustomerId>,
    pub renewal_case_id: Option<RenewalCaseId>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub customer_id: CustomerId,
    pub renewal_case_id: Option<RenewalCaseId>,
    pub amount: Decimal,
    /// Defaults to now
    pub payment_date: Option<DateTime<Utc>>,
    pub due_date: NaiveDate,
    pub mode: PaymentMode,
    pub status: Option<PaymentStatus>,
    #[validate(length(min = 1, max = 100))]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    /// `null` detaches the payment from its case
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub renewal_case_id: Option<Option<RenewalCaseId>>,
    pub amount: Option<Decimal>,
    pub payment_date: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub mode: Option<PaymentMode>,
    pub status: Option<PaymentStatus>,
    #[validate(length(min = 1, max = 100))]
    pub transaction_id: Option<String>,
}
