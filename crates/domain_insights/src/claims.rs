//! Claims insights

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::string_enum;
use domain_policy::PolicyClaim;

use crate::{percent, round1};

/// Window for the risk level, in days
pub const RISK_WINDOW_DAYS: i64 = 3 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

string_enum!(RiskLevel, "risk level", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl RiskLevel {
    /// Claims filed in the last three years: 0..=1 low, 2..=3 medium, 4+ high
    pub fn from_recent_claims(count: usize) -> Self {
        match count {
            0 | 1 => RiskLevel::Low,
            2 | 3 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimFrequency {
    NoClaims,
    Low,
    Medium,
    High,
}

string_enum!(ClaimFrequency, "claim frequency", {
    NoClaims => "none",
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl ClaimFrequency {
    /// Claims filed in the last twelve months
    pub fn from_yearly_claims(count: usize) -> Self {
        match count {
            0 => ClaimFrequency::NoClaims,
            1 => ClaimFrequency::Low,
            2 => ClaimFrequency::Medium,
            _ => ClaimFrequency::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsInsights {
    pub total_claims: u32,
    pub total_claimed_amount: Decimal,
    /// Sum of approved amounts on approved and settled claims
    pub approved_amount: Decimal,
    /// Mean days from filing to decision over decided claims
    pub avg_processing_days: f64,
    /// Approved share of decided claims
    pub approval_rate: f64,
    pub claims_by_type: BTreeMap<String, u32>,
    pub claims_by_status: BTreeMap<String, u32>,
    pub risk_level: RiskLevel,
    pub last_claim_date: Option<NaiveDate>,
    pub claim_frequency: ClaimFrequency,
}

impl ClaimsInsights {
    pub fn empty() -> Self {
        Self {
            total_claims: 0,
            total_claimed_amount: Decimal::ZERO,
            approved_amount: Decimal::ZERO,
            avg_processing_days: 0.0,
            approval_rate: 0.0,
            claims_by_type: BTreeMap::new(),
            claims_by_status: BTreeMap::new(),
            risk_level: RiskLevel::Low,
            last_claim_date: None,
            claim_frequency: ClaimFrequency::NoClaims,
        }
    }

    pub fn compute(claims: &[PolicyClaim], today: NaiveDate) -> Self {
        if claims.is_empty() {
            return Self::empty();
        }

        let decided: Vec<&PolicyClaim> = claims.iter().filter(|c| c.status.is_decided()).collect();
        let approved = decided.iter().filter(|c| c.status.is_approved()).count();
        let processing: Vec<i64> = decided.iter().filter_map(|c| c.processing_days()).collect();
        let avg_processing_days = if processing.is_empty() {
            0.0
        } else {
            processing.iter().sum::<i64>() as f64 / processing.len() as f64
        };

        let mut by_type: BTreeMap<String, u32> = BTreeMap::new();
        let mut by_status: BTreeMap<String, u32> = BTreeMap::new();
        for claim in claims {
            *by_type.entry(claim.claim_type.as_str().to_string()).or_default() += 1;
            *by_status.entry(claim.status.as_str().to_string()).or_default() += 1;
        }

        let filed_since = |days: i64| {
            let from = today - Duration::days(days);
            claims.iter().filter(|c| c.claim_date > from).count()
        };

        Self {
            total_claims: claims.len() as u32,
            total_claimed_amount: claims.iter().map(|c| c.claim_amount).sum(),
            approved_amount: claims
                .iter()
                .filter(|c| c.status.is_approved())
                .filter_map(|c| c.approved_amount)
                .sum(),
            avg_processing_days: round1(avg_processing_days),
            approval_rate: round1(percent(approved, decided.len())),
            claims_by_type: by_type,
            claims_by_status: by_status,
            risk_level: RiskLevel::from_recent_claims(filed_since(RISK_WINDOW_DAYS)),
            last_claim_date: claims.iter().map(|c| c.claim_date).max(),
            claim_frequency: ClaimFrequency::from_yearly_claims(filed_since(365)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PolicyId;
    use domain_policy::{ClaimStatus, ClaimType};
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn claim(days_ago: i64, claim_type: ClaimType, amount: Decimal) -> PolicyClaim {
        let date = today() - Duration::days(days_ago);
        PolicyClaim::submit(PolicyId::new(), claim_type, amount, date, date).unwrap()
    }

    #[test]
    fn test_empty_structure() {
        assert_eq!(ClaimsInsights::compute(&[], today()), ClaimsInsights::empty());
    }

    #[test]
    fn test_approval_and_amounts() {
        let mut approved = claim(30, ClaimType::Vehicle, dec!(45000));
        approved.start_review().unwrap();
        approved.approve(dec!(42000)).unwrap();

        let mut rejected = claim(90, ClaimType::Home, dec!(35000));
        rejected.start_review().unwrap();
        rejected.reject("Preventive maintenance not done").unwrap();

        let pending = claim(400, ClaimType::Vehicle, dec!(5000));

        let insights = ClaimsInsights::compute(&[approved, rejected, pending], today());
        assert_eq!(insights.total_claims, 3);
        assert_eq!(insights.total_claimed_amount, dec!(85000));
        assert_eq!(insights.approved_amount, dec!(42000));
        assert_eq!(insights.approval_rate, 50.0);
        assert_eq!(insights.claims_by_type.get("vehicle"), Some(&2));
        assert_eq!(insights.claims_by_status.get("submitted"), Some(&1));
        assert_eq!(insights.risk_level, RiskLevel::Medium);
        assert_eq!(insights.claim_frequency, ClaimFrequency::Medium);
        assert_eq!(insights.last_claim_date, Some(today() - Duration::days(30)));
    }

    #[test]
    fn test_old_claims_do_not_raise_risk() {
        let claims: Vec<_> = (0..5)
            .map(|i| claim(RISK_WINDOW_DAYS + 10 + i, ClaimType::Health, dec!(1000)))
            .collect();
        let insights = ClaimsInsights::compute(&claims, today());
        assert_eq!(insights.risk_level, RiskLevel::Low);
        assert_eq!(insights.claim_frequency, ClaimFrequency::NoClaims);
        assert!(claims.iter().all(|c| c.status == ClaimStatus::Submitted));
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::from_recent_claims(1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_recent_claims(3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_recent_claims(4), RiskLevel::High);
    }
}
