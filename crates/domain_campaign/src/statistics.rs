//! Campaign counters and rates derived from recipient state

use serde::{Deserialize, Serialize};

use crate::recipient::CampaignRecipient;

/// Counters stored on the campaign, recomputed from its recipients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStatistics {
    pub sent_count: u32,
    pub delivered_count: u32,
    pub opened_count: u32,
    pub clicked_count: u32,
    pub total_responses: u32,
}

impl CampaignStatistics {
    /// Each recipient counts at every stage it has reached: a clicked
    /// message is also opened, delivered and sent.
    pub fn from_recipients(recipients: &[CampaignRecipient]) -> Self {
        let mut stats = Self::default();
        for r in recipients {
            if r.email_sent_at.is_some() {
                stats.sent_count += 1;
            }
            if r.email_delivered_at.is_some() {
                stats.delivered_count += 1;
            }
            if r.email_engagement.has_opened() {
                stats.opened_count += 1;
            }
            if r.email_engagement.has_clicked() {
                stats.clicked_count += 1;
            }
            if r.email_engagement.has_responded() || r.has_responded {
                stats.total_responses += 1;
            }
        }
        stats
    }

    /// Delivered as a share of sent
    pub fn delivery_rate(&self) -> f64 {
        percentage(self.delivered_count, self.sent_count)
    }

    /// Opened as a share of delivered
    pub fn open_rate(&self) -> f64 {
        percentage(self.opened_count, self.delivered_count)
    }

    /// Clicked as a share of opened
    pub fn click_rate(&self) -> f64 {
        percentage(self.clicked_count, self.opened_count)
    }

    /// Responses as a share of delivered
    pub fn response_rate(&self) -> f64 {
        percentage(self.total_responses, self.delivered_count)
    }
}

/// Percentage rounded to two places; zero when there is nothing to divide by
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (f64::from(part) / f64::from(whole) * 10_000.0).round() / 100.0
}

/// Campaign performance for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    pub total_recipients: u32,
    #[serde(flatten)]
    pub counts: CampaignStatistics,
    pub pending_count: u32,
    pub failed_count: u32,
    /// Sent as a share of all recipients
    pub sent_rate: f64,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub response_rate: f64,
}

impl CampaignMetrics {
    pub fn from_recipients(recipients: &[CampaignRecipient]) -> Self {
        let counts = CampaignStatistics::from_recipients(recipients);
        let total = recipients.len() as u32;
        let pending_count = recipients.iter().filter(|r| r.is_pending()).count() as u32;
        let failed_count = recipients
            .iter()
            .filter(|r| r.email_status == crate::recipient::DeliveryStatus::Failed)
            .count() as u32;
        Self {
            total_recipients: total,
            counts,
            pending_count,
            failed_count,
            sent_rate: percentage(counts.sent_count, total),
            delivery_rate: counts.delivery_rate(),
            open_rate: counts.open_rate(),
            click_rate: counts.click_rate(),
            response_rate: counts.response_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_kernel::{CampaignId, CustomerId};

    fn recipients() -> Vec<CampaignRecipient> {
        let campaign = CampaignId::new();
        let now = Utc::now();
        let mut list: Vec<_> = (0..6)
            .map(|_| CampaignRecipient::new(campaign, CustomerId::new(), None))
            .collect();
        // 0: pending, 1: failed, 2: sent, 3: delivered, 4: clicked, 5: replied
        list[1].mark_failed("rejected", now);
        list[2].mark_sent(now);
        list[3].mark_sent(now);
        list[3].mark_delivered(now);
        list[4].mark_sent(now);
        list[4].mark_clicked(now);
        list[5].mark_sent(now);
        list[5].mark_replied(now);
        list
    }

    #[test]
    fn test_counts_include_later_stages() {
        let stats = CampaignStatistics::from_recipients(&recipients());
        assert_eq!(
            stats,
            CampaignStatistics {
                sent_count: 4,
                delivered_count: 3,
                opened_count: 2,
                clicked_count: 2,
                total_responses: 1,
            }
        );
    }

    #[test]
    fn test_rates() {
        let metrics = CampaignMetrics::from_recipients(&recipients());
        assert_eq!(metrics.total_recipients, 6);
        assert_eq!(metrics.pending_count, 1);
        assert_eq!(metrics.failed_count, 1);
        assert_eq!(metrics.sent_rate, 66.67);
        assert_eq!(metrics.delivery_rate, 75.0);
        assert_eq!(metrics.open_rate, 66.67);
        assert_eq!(metrics.click_rate, 100.0);
        assert_eq!(metrics.response_rate, 33.33);
    }

    #[test]
    fn test_empty_campaign_has_zero_rates() {
        let metrics = CampaignMetrics::from_recipients(&[]);
        assert_eq!(metrics.sent_rate, 0.0);
        assert_eq!(metrics.delivery_rate, 0.0);
        assert_eq!(metrics.response_rate, 0.0);
    }
}
