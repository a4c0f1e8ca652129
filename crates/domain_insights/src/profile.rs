//! Customer profile insights

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::string_enum;
use domain_policy::PolicyStatus;
use rust_decimal_macros::dec;

use crate::records::CustomerRecords;
use crate::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    Hni,
    Premium,
    Standard,
}

string_enum!(CustomerSegment, "customer segment", {
    Hni => "hni",
    Premium => "premium",
    Standard => "standard",
});

impl CustomerSegment {
    /// 3+ active policies and 50 000+ in premiums is HNI; 2+ active is Premium
    pub fn classify(active_policies: usize, total_premium: Decimal) -> Self {
        if active_policies >= 3 && total_premium >= dec!(50000) {
            CustomerSegment::Hni
        } else if active_policies >= 2 {
            CustomerSegment::Premium
        } else {
            CustomerSegment::Standard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

string_enum!(EngagementLevel, "engagement level", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

impl EngagementLevel {
    /// By contacts in the last 30 days
    pub fn from_recent_contacts(count: usize) -> Self {
        match count {
            n if n >= 5 => EngagementLevel::High,
            n if n >= 2 => EngagementLevel::Medium,
            _ => EngagementLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsights {
    pub active_policies: u32,
    pub expired_lapsed_policies: u32,
    /// Premium across all non-deleted policies
    pub customer_lifetime_value: Decimal,
    pub total_paid_ytd: Decimal,
    pub customer_segment: CustomerSegment,
    pub engagement_level: EngagementLevel,
    /// Policy count by policy type name
    pub policy_portfolio: BTreeMap<String, u32>,
    /// 0 (lowest risk) to 100
    pub overall_risk_score: f64,
}

impl ProfileInsights {
    pub fn compute(records: &CustomerRecords, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let policies: Vec<_> = records.live_policies().collect();

        let active = policies
            .iter()
            .filter(|p| p.status == PolicyStatus::Active)
            .count();
        let expired = policies
            .iter()
            .filter(|p| matches!(p.status, PolicyStatus::Expired | PolicyStatus::Cancelled))
            .count();
        let lifetime_value: Decimal = policies.iter().map(|p| p.premium_amount).sum();

        let total_paid_ytd = records
            .live_payments()
            .filter(|p| p.payment_date.year() == today.year())
            .map(|p| p.amount)
            .sum();

        let since = now - Duration::days(30);
        let recent_contacts = records
            .live_communications()
            .filter(|c| c.communication_date >= since)
            .count();

        let mut portfolio: BTreeMap<String, u32> = BTreeMap::new();
        for policy in &policies {
            let name = records
                .policy_type_names
                .get(&policy.policy_type_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            *portfolio.entry(name).or_default() += 1;
        }

        Self {
            active_policies: active as u32,
            expired_lapsed_policies: expired as u32,
            customer_lifetime_value: lifetime_value,
            total_paid_ytd,
            customer_segment: CustomerSegment::classify(active, lifetime_value),
            engagement_level: EngagementLevel::from_recent_contacts(recent_contacts),
            policy_portfolio: portfolio,
            overall_risk_score: risk_score(records, policies.len(), now),
        }
    }
}

/// Base 50, adjusted by payment punctuality, portfolio size and tenure
fn risk_score(records: &CustomerRecords, policy_count: usize, now: DateTime<Utc>) -> f64 {
    let mut score: f64 = 50.0;

    let payments: Vec<_> = records.live_payments().collect();
    if !payments.is_empty() {
        let on_time = payments.iter().filter(|p| p.is_on_time()).count();
        let rate = percent(on_time, payments.len());
        if rate >= 95.0 {
            score -= 10.0;
        } else if rate < 70.0 {
            score += 15.0;
        }
    }

    if policy_count > 3 {
        score -= 5.0;
    }

    if records.customer.years_as_customer(now.date_naive()) > 5 {
        score -= 10.0;
    }

    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_rules() {
        assert_eq!(CustomerSegment::classify(3, dec!(50000)), CustomerSegment::Hni);
        assert_eq!(CustomerSegment::classify(3, dec!(49999)), CustomerSegment::Premium);
        assert_eq!(CustomerSegment::classify(2, dec!(0)), CustomerSegment::Premium);
        assert_eq!(CustomerSegment::classify(1, dec!(900000)), CustomerSegment::Standard);
    }

    #[test]
    fn test_engagement_rules() {
        assert_eq!(EngagementLevel::from_recent_contacts(5), EngagementLevel::High);
        assert_eq!(EngagementLevel::from_recent_contacts(2), EngagementLevel::Medium);
        assert_eq!(EngagementLevel::from_recent_contacts(1), EngagementLevel::Low);
    }
}
