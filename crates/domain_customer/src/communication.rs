//! Communication log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, CommunicationLogId, CustomerId};

/// Channel a communication went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationChannel {
    Email,
    Sms,
    Whatsapp,
    Phone,
    InPerson,
    Letter,
}

string_enum!(CommunicationChannel, "communication channel", {
    Email => "email",
    Sms => "sms",
    Whatsapp => "whatsapp",
    Phone => "phone",
    InPerson => "in_person",
    Letter => "letter",
});

/// What came of a communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationOutcome {
    Successful,
    Delivered,
    Opened,
    Clicked,
    Replied,
    Failed,
    Bounced,
    NoResponse,
    Escalated,
}

string_enum!(CommunicationOutcome, "communication outcome", {
    Successful => "successful",
    Delivered => "delivered",
    Opened => "opened",
    Clicked => "clicked",
    Replied => "replied",
    Failed => "failed",
    Bounced => "bounced",
    NoResponse => "no_response",
    Escalated => "escalated",
});

impl CommunicationOutcome {
    /// Outcomes that count towards customer satisfaction
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            CommunicationOutcome::Successful
                | CommunicationOutcome::Delivered
                | CommunicationOutcome::Opened
                | CommunicationOutcome::Replied
        )
    }

    /// Outcomes where the customer engaged back
    pub fn is_response(&self) -> bool {
        matches!(self, CommunicationOutcome::Replied | CommunicationOutcome::Clicked)
    }
}

/// One communication with a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationLog {
    pub id: CommunicationLogId,
    pub customer_id: CustomerId,
    pub channel: CommunicationChannel,
    pub communication_date: DateTime<Utc>,
    pub outcome: CommunicationOutcome,
    pub message_content: String,
    pub response_received: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunicationLog {
    pub fn new(
        customer_id: CustomerId,
        channel: CommunicationChannel,
        communication_date: DateTime<Utc>,
        outcome: CommunicationOutcome,
        message_content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CommunicationLogId::new_v7(),
            customer_id,
            channel,
            communication_date,
            outcome,
            message_content: message_content.into(),
            response_received: outcome.is_response(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Message content cut to `max_chars` characters with a trailing `...`
    pub fn preview(&self, max_chars: usize) -> String {
        if self.message_content.chars().count() <= max_chars {
            return self.message_content.clone();
        }
        let cut: String = self.message_content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }

    /// Marks the log deleted; returns false if it already was
    pub fn soft_delete(&mut self) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.updated_at = Utc::now();
        true
    }
}
