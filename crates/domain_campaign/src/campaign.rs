//! Campaigns and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, CampaignId, EmailTemplateId};

use crate::error::CampaignError;
use crate::statistics::CampaignStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
    Cancelled,
}

string_enum!(CampaignStatus, "campaign status", {
    Draft => "draft",
    Scheduled => "scheduled",
    Running => "running",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl CampaignStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    pub fn can_transition_to(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, to) {
            (from, to) if from == to => false,
            (Cancelled, _) => false,
            // A completed campaign reopens when recipients are retried
            (Completed, Running) => true,
            (Completed, _) => false,
            (Draft, Scheduled | Running | Cancelled) => true,
            (Scheduled, Draft | Running | Cancelled) => true,
            (Running, Paused | Completed | Cancelled) => true,
            (Paused, Running | Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignChannel {
    Email,
    Whatsapp,
    Sms,
    Phone,
    Push,
}

string_enum!(CampaignChannel, "campaign channel", {
    Email => "email",
    Whatsapp => "whatsapp",
    Sms => "sms",
    Phone => "phone",
    Push => "push",
});

/// Which customers become recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every live customer, paired with their newest policy
    AllCustomers,
    /// Customers whose policy has ended and is still awaiting renewal
    ExpiredPolicies,
}

string_enum!(Audience, "audience", {
    AllCustomers => "all_customers",
    ExpiredPolicies => "expired_policies",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub description: Option<String>,
    pub status: CampaignStatus,
    pub channels: Vec<CampaignChannel>,
    pub template_id: Option<EmailTemplateId>,
    /// Overrides the template subject when set
    pub subject_line: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub target_count: u32,
    #[serde(flatten)]
    pub statistics: CampaignStatistics,
    pub created_by: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        name: impl Into<String>,
        channels: Vec<CampaignChannel>,
        created_by: impl Into<String>,
    ) -> Result<Self, CampaignError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CampaignError::Validation("campaign name is required".into()));
        }
        if channels.is_empty() {
            return Err(CampaignError::Validation("at least one channel is required".into()));
        }
        let mut unique = Vec::with_capacity(channels.len());
        for channel in channels {
            if !unique.contains(&channel) {
                unique.push(channel);
            }
        }
        let now = Utc::now();
        Ok(Self {
            id: CampaignId::new_v7(),
            name,
            description: None,
            status: CampaignStatus::Draft,
            channels: unique,
            template_id: None,
            subject_line: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            target_count: 0,
            statistics: CampaignStatistics::default(),
            created_by: created_by.into(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_template(mut self, template_id: EmailTemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }

    pub fn includes_email(&self) -> bool {
        self.channels.contains(&CampaignChannel::Email)
    }

    /// Moves to `to`, stamping start and completion times
    pub fn transition(&mut self, to: CampaignStatus, now: DateTime<Utc>) -> Result<(), CampaignError> {
        if !self.status.can_transition_to(to) {
            return Err(CampaignError::InvalidTransition { from: self.status, to });
        }
        match to {
            CampaignStatus::Running => {
                self.started_at.get_or_insert(now);
                self.completed_at = None;
            }
            CampaignStatus::Completed | CampaignStatus::Cancelled => {
                self.completed_at = Some(now);
            }
            _ => {}
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Schedules a draft for a future send
    pub fn schedule(&mut self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), CampaignError> {
        if at <= now {
            return Err(CampaignError::Validation("scheduled time must be in the future".into()));
        }
        self.transition(CampaignStatus::Scheduled, now)?;
        self.scheduled_at = Some(at);
        Ok(())
    }

    /// Status after a send round
    ///
    /// Nothing sent leaves the status alone; a round with failures keeps the
    /// campaign running so failed recipients can be retried.
    pub fn settle_after_send(&mut self, sent: u32, failed: u32, now: DateTime<Utc>) {
        if sent == 0 {
            return;
        }
        self.started_at.get_or_insert(now);
        if failed == 0 {
            self.status = CampaignStatus::Completed;
            self.completed_at = Some(now);
        } else {
            self.status = CampaignStatus::Running;
            self.completed_at = None;
        }
        self.updated_at = now;
    }

    pub fn apply_statistics(&mut self, statistics: CampaignStatistics) {
        self.statistics = statistics;
        self.updated_at = Utc::now();
    }

    pub fn delivery_rate(&self) -> f64 {
        self.statistics.delivery_rate()
    }

    pub fn open_rate(&self) -> f64 {
        self.statistics.open_rate()
    }

    pub fn click_rate(&self) -> f64 {
        self.statistics.click_rate()
    }

    pub fn response_rate(&self) -> f64 {
        self.statistics.response_rate()
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn campaign() -> Campaign {
        Campaign::new("Q3 renewals", vec![CampaignChannel::Email, CampaignChannel::Email], "agent-1").unwrap()
    }

    #[test]
    fn test_new_campaign_is_draft_with_unique_channels() {
        let c = campaign();
        assert_eq!(c.status, CampaignStatus::Draft);
        assert_eq!(c.channels, vec![CampaignChannel::Email]);
        assert!(c.includes_email());
        assert!(Campaign::new("x", vec![], "agent-1").is_err());
    }

    #[test]
    fn test_transitions() {
        let now = Utc::now();
        let mut c = campaign();
        c.transition(CampaignStatus::Running, now).unwrap();
        assert_eq!(c.started_at, Some(now));
        c.transition(CampaignStatus::Paused, now).unwrap();
        c.transition(CampaignStatus::Cancelled, now).unwrap();
        assert_eq!(c.completed_at, Some(now));

        let err = c.transition(CampaignStatus::Running, now).unwrap_err();
        assert!(matches!(
            err,
            CampaignError::InvalidTransition { from: CampaignStatus::Cancelled, to: CampaignStatus::Running }
        ));
    }

    #[test]
    fn test_schedule_needs_future_time() {
        let now = Utc::now();
        let mut c = campaign();
        assert!(c.schedule(now - Duration::hours(1), now).is_err());
        c.schedule(now + Duration::hours(1), now).unwrap();
        assert_eq!(c.status, CampaignStatus::Scheduled);
    }

    #[test]
    fn test_settle_after_send() {
        let now = Utc::now();
        let mut c = campaign();
        c.settle_after_send(0, 3, now);
        assert_eq!(c.status, CampaignStatus::Draft);

        c.settle_after_send(5, 1, now);
        assert_eq!(c.status, CampaignStatus::Running);
        assert_eq!(c.started_at, Some(now));

        c.settle_after_send(1, 0, now);
        assert_eq!(c.status, CampaignStatus::Completed);
        assert_eq!(c.completed_at, Some(now));
    }
}
