//! Campaign recipients and their email delivery and engagement state
//!
//! Delivery status follows the message through the provider
//! (`pending → queued → sent → delivered`, or `failed`/`bounced`).
//! Engagement only moves forward: an open never overwrites a click, and a
//! click or open implies the message was delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{string_enum, CampaignId, CampaignRecipientId, CustomerId, PolicyId};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Queued,
    Sent,
    Delivered,
    Failed,
    Bounced,
    Rejected,
    OptedOut,
    Blocked,
}

string_enum!(DeliveryStatus, "delivery status", {
    Pending => "pending",
    Queued => "queued",
    Sent => "sent",
    Delivered => "delivered",
    Failed => "failed",
    Bounced => "bounced",
    Rejected => "rejected",
    OptedOut => "opted_out",
    Blocked => "blocked",
});

/// Ordered from least to most engaged; `Unsubscribed` sits outside the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStatus {
    NotOpened,
    Opened,
    Clicked,
    Replied,
    Forwarded,
    Unsubscribed,
}

string_enum!(EngagementStatus, "engagement status", {
    NotOpened => "not_opened",
    Opened => "opened",
    Clicked => "clicked",
    Replied => "replied",
    Forwarded => "forwarded",
    Unsubscribed => "unsubscribed",
});

impl EngagementStatus {
    fn rank(self) -> u8 {
        match self {
            EngagementStatus::NotOpened | EngagementStatus::Unsubscribed => 0,
            EngagementStatus::Opened => 1,
            EngagementStatus::Clicked => 2,
            EngagementStatus::Replied | EngagementStatus::Forwarded => 3,
        }
    }

    pub fn has_opened(self) -> bool {
        self.rank() >= 1
    }

    pub fn has_clicked(self) -> bool {
        self.rank() >= 2
    }

    pub fn has_responded(self) -> bool {
        self.rank() >= 3
    }
}

/// One customer targeted by one campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: CampaignRecipientId,
    pub campaign_id: CampaignId,
    pub customer_id: CustomerId,
    pub policy_id: Option<PolicyId>,
    pub email_status: DeliveryStatus,
    pub email_engagement: EngagementStatus,
    /// Opaque id carried by tracking links
    pub tracking_id: String,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_delivered_at: Option<DateTime<Utc>>,
    pub email_opened_at: Option<DateTime<Utc>>,
    pub email_clicked_at: Option<DateTime<Utc>>,
    pub email_replied_at: Option<DateTime<Utc>>,
    pub email_error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub has_responded: bool,
    pub response_received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRecipient {
    pub fn new(campaign_id: CampaignId, customer_id: CustomerId, policy_id: Option<PolicyId>) -> Self {
        let now = Utc::now();
        Self {
            id: CampaignRecipientId::new_v7(),
            campaign_id,
            customer_id,
            policy_id,
            email_status: DeliveryStatus::Pending,
            email_engagement: EngagementStatus::NotOpened,
            tracking_id: Uuid::new_v4().simple().to_string(),
            email_sent_at: None,
            email_delivered_at: None,
            email_opened_at: None,
            email_clicked_at: None,
            email_replied_at: None,
            email_error_message: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            has_responded: false,
            response_received_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.email_status == DeliveryStatus::Pending
    }

    pub fn mark_queued(&mut self, now: DateTime<Utc>) {
        self.email_status = DeliveryStatus::Queued;
        self.updated_at = now;
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.email_status = DeliveryStatus::Sent;
        self.email_sent_at = Some(now);
        self.email_error_message = None;
        self.updated_at = now;
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.email_status = DeliveryStatus::Delivered;
        self.email_sent_at.get_or_insert(now);
        self.email_delivered_at.get_or_insert(now);
        self.updated_at = now;
    }

    pub fn mark_bounced(&mut self, reason: Option<String>, now: DateTime<Utc>) {
        self.email_status = DeliveryStatus::Bounced;
        self.email_error_message = reason;
        self.updated_at = now;
    }

    /// Records a failed send; each failure counts against `max_retries`
    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.email_status = DeliveryStatus::Failed;
        self.email_error_message = Some(error.into());
        self.retry_count += 1;
        self.updated_at = now;
    }

    pub fn mark_opened(&mut self, now: DateTime<Utc>) {
        self.ensure_delivered(now);
        self.email_opened_at.get_or_insert(now);
        self.raise_engagement(EngagementStatus::Opened);
        self.updated_at = now;
    }

    pub fn mark_clicked(&mut self, now: DateTime<Utc>) {
        self.mark_opened(now);
        self.email_clicked_at.get_or_insert(now);
        self.raise_engagement(EngagementStatus::Clicked);
    }

    pub fn mark_replied(&mut self, now: DateTime<Utc>) {
        self.mark_opened(now);
        self.email_replied_at.get_or_insert(now);
        self.raise_engagement(EngagementStatus::Replied);
        self.has_responded = true;
        self.response_received_at.get_or_insert(now);
    }

    /// A failed recipient with retries left goes back to pending
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) -> bool {
        if self.email_status != DeliveryStatus::Failed || self.retry_count >= self.max_retries {
            return false;
        }
        self.email_status = DeliveryStatus::Pending;
        self.updated_at = now;
        true
    }

    fn ensure_delivered(&mut self, now: DateTime<Utc>) {
        if self.email_delivered_at.is_none() {
            self.mark_delivered(now);
        }
    }

    fn raise_engagement(&mut self, to: EngagementStatus) {
        if self.email_engagement.rank() < to.rank() {
            self.email_engagement = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn recipient() -> CampaignRecipient {
        CampaignRecipient::new(CampaignId::new(), CustomerId::new(), None)
    }

    #[test]
    fn test_tracking_ids_are_unique_hex() {
        let a = recipient();
        let b = recipient();
        assert_eq!(a.tracking_id.len(), 32);
        assert!(a.tracking_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.tracking_id, b.tracking_id);
    }

    #[test]
    fn test_open_implies_delivery() {
        let now = Utc::now();
        let mut r = recipient();
        r.mark_sent(now);
        r.mark_opened(now + Duration::minutes(5));

        assert_eq!(r.email_status, DeliveryStatus::Delivered);
        assert_eq!(r.email_delivered_at, Some(now + Duration::minutes(5)));
        assert_eq!(r.email_engagement, EngagementStatus::Opened);
    }

    #[test]
    fn test_open_after_click_keeps_click() {
        let now = Utc::now();
        let mut r = recipient();
        r.mark_sent(now);
        r.mark_clicked(now + Duration::minutes(1));
        r.mark_opened(now + Duration::minutes(2));

        assert_eq!(r.email_engagement, EngagementStatus::Clicked);
        assert_eq!(r.email_opened_at, Some(now + Duration::minutes(1)));
    }

    #[test]
    fn test_reply_counts_as_response() {
        let mut r = recipient();
        r.mark_sent(Utc::now());
        r.mark_replied(Utc::now());
        assert!(r.has_responded);
        assert_eq!(r.email_engagement, EngagementStatus::Replied);
        assert!(r.email_engagement.has_clicked());
        assert!(r.email_opened_at.is_some());
    }

    #[test]
    fn test_failures_use_up_retries() {
        let mut r = recipient();
        for _ in 0..DEFAULT_MAX_RETRIES {
            r.mark_failed("smtp timeout", Utc::now());
            if r.retry_count < DEFAULT_MAX_RETRIES {
                assert!(r.reset_for_retry(Utc::now()));
                assert!(r.is_pending());
            }
        }
        assert_eq!(r.retry_count, DEFAULT_MAX_RETRIES);
        assert!(!r.reset_for_retry(Utc::now()));
        assert_eq!(r.email_status, DeliveryStatus::Failed);
        assert_eq!(r.email_error_message.as_deref(), Some("smtp timeout"));
    }

    #[test]
    fn test_sent_clears_previous_error() {
        let mut r = recipient();
        r.mark_failed("timeout", Utc::now());
        r.reset_for_retry(Utc::now());
        r.mark_sent(Utc::now());
        assert_eq!(r.email_error_message, None);
        assert_eq!(r.retry_count, 1);
    }
}
