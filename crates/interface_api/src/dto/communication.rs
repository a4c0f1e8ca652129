//! Communication log DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use core_kernel::CustomerId;
use domain_customer::{CommunicationChannel, CommunicationOutcome};

#[derive(Debug, Default, Deserialize)]
pub struct CommunicationQuery {
    pub customer_id: Option<CustomerId>,
    pub channel: Option<CommunicationChannel>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommunicationRequest {
    pub customer_id: CustomerId,
    pub channel: CommunicationChannel,
    /// Defaults to now
    pub communication_date: Option<DateTime<Utc>>,
    pub outcome: CommunicationOutcome,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub message_content: String,
    pub response_received: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommunicationRequest {
    pub customer_id: Option<CustomerId>,
    pub channel: Option<CommunicationChannel>,
    pub communication_date: Option<DateTime<Utc>>,
    pub outcome: Option<CommunicationOutcome>,
    #[validate(length(max = 10000))]
    pub message_content: Option<String>,
    pub response_received: Option<bool>,
}
