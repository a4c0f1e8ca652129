//! Communication insights

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::string_enum;
use domain_customer::{CommunicationChannel, CommunicationLog, CommunicationOutcome};

use crate::{percent, round1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactFrequency {
    High,
    Medium,
    Low,
    VeryLow,
    Unknown,
}

string_enum!(ContactFrequency, "communication frequency", {
    High => "high",
    Medium => "medium",
    Low => "low",
    VeryLow => "very_low",
    Unknown => "unknown",
});

impl ContactFrequency {
    pub fn from_count(total: usize) -> Self {
        match total {
            0 => ContactFrequency::Unknown,
            n if n >= 20 => ContactFrequency::High,
            n if n >= 10 => ContactFrequency::Medium,
            n if n >= 5 => ContactFrequency::Low,
            _ => ContactFrequency::VeryLow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationInsights {
    pub total_communications: u32,
    /// Mean hours from a contact to the customer's next reply on that channel
    pub avg_response_time_hours: f64,
    /// Successful share scaled to 0..=5
    pub satisfaction_rating: f64,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub channel_breakdown: BTreeMap<String, u32>,
    pub preferred_channel: Option<CommunicationChannel>,
    pub communication_frequency: ContactFrequency,
    pub response_rate: f64,
    pub escalation_count: u32,
}

impl CommunicationInsights {
    pub fn empty() -> Self {
        Self {
            total_communications: 0,
            avg_response_time_hours: 0.0,
            satisfaction_rating: 0.0,
            last_contact_date: None,
            channel_breakdown: BTreeMap::new(),
            preferred_channel: None,
            communication_frequency: ContactFrequency::Unknown,
            response_rate: 0.0,
            escalation_count: 0,
        }
    }

    pub fn compute<'a>(logs: impl IntoIterator<Item = &'a CommunicationLog>) -> Self {
        let mut logs: Vec<&CommunicationLog> = logs.into_iter().filter(|l| !l.is_deleted).collect();
        if logs.is_empty() {
            return Self::empty();
        }
        logs.sort_by_key(|l| l.communication_date);

        let total = logs.len();
        let successful = logs.iter().filter(|l| l.outcome.is_successful()).count();
        let responses = logs.iter().filter(|l| l.outcome.is_response()).count();
        let escalations = logs
            .iter()
            .filter(|l| l.outcome == CommunicationOutcome::Escalated)
            .count();

        let mut by_channel: BTreeMap<CommunicationChannel, u32> = BTreeMap::new();
        for log in &logs {
            *by_channel.entry(log.channel).or_default() += 1;
        }
        // highest count; ties go to the channel listed first
        let preferred_channel = by_channel
            .iter()
            .max_by(|(ca, a), (cb, b)| a.cmp(b).then_with(|| cb.cmp(ca)))
            .map(|(channel, _)| *channel);

        Self {
            total_communications: total as u32,
            avg_response_time_hours: round1(average_response_hours(&logs)),
            satisfaction_rating: round1(successful as f64 / total as f64 * 5.0),
            last_contact_date: logs.last().map(|l| l.communication_date),
            channel_breakdown: by_channel
                .into_iter()
                .map(|(channel, count)| (channel.as_str().to_string(), count))
                .collect(),
            preferred_channel,
            communication_frequency: ContactFrequency::from_count(total),
            response_rate: round1(percent(responses, total)),
            escalation_count: escalations as u32,
        }
    }
}

/// Mean gap in hours between each outbound contact and the next reply
///
/// `logs` must be sorted oldest first. Contacts with no later reply on the
/// same channel are left out; with no pairs at all the result is 0.
fn average_response_hours(logs: &[&CommunicationLog]) -> f64 {
    let gaps: Vec<f64> = logs
        .iter()
        .enumerate()
        .filter(|(_, log)| log.outcome != CommunicationOutcome::Replied)
        .filter_map(|(i, log)| {
            logs[i + 1..]
                .iter()
                .find(|later| {
                    later.channel == log.channel
                        && later.outcome == CommunicationOutcome::Replied
                        && later.communication_date > log.communication_date
                })
                .map(|reply| (reply.communication_date - log.communication_date).num_minutes() as f64 / 60.0)
        })
        .collect();

    if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<f64>() / gaps.len() as f64
    }
}
