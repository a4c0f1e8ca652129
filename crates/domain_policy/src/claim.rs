//! Policy claims
//!
//! Claims feed the claims section of customer insights. A claim is
//! reviewed, then decided, and approved claims are settled.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, ClaimId, PolicyId};

use crate::error::PolicyError;

/// Kind of loss claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Vehicle,
    Home,
    Health,
    Travel,
    Life,
    Other,
}

string_enum!(ClaimType, "claim type", {
    Vehicle => "vehicle",
    Home => "home",
    Health => "health",
    Travel => "travel",
    Life => "life",
    Other => "other",
});

/// Claim workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Settled,
    Withdrawn,
}

string_enum!(ClaimStatus, "claim status", {
    Submitted => "submitted",
    UnderReview => "under_review",
    Approved => "approved",
    Rejected => "rejected",
    Settled => "settled",
    Withdrawn => "withdrawn",
});

impl ClaimStatus {
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Submitted, UnderReview)
                | (Submitted, Withdrawn)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (UnderReview, Withdrawn)
                | (Approved, Settled)
        )
    }

    /// A decision has been made on the claim
    pub fn is_decided(&self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Rejected | ClaimStatus::Settled)
    }

    /// Counts as an approval for approval-rate purposes
    pub fn is_approved(&self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Settled)
    }
}

/// A claim raised against a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyClaim {
    pub id: ClaimId,
    pub claim_number: String,
    pub policy_id: PolicyId,
    pub claim_type: ClaimType,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub incident_date: NaiveDate,
    pub claim_date: NaiveDate,
    pub status: ClaimStatus,
    pub rejection_reason: Option<String>,
    /// Set when the claim reaches a decided status
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyClaim {
    pub fn submit(
        policy_id: PolicyId,
        claim_type: ClaimType,
        claim_amount: Decimal,
        incident_date: NaiveDate,
        claim_date: NaiveDate,
    ) -> Result<Self, PolicyError> {
        if claim_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("claim amount must be positive"));
        }
        if incident_date > claim_date {
            return Err(PolicyError::validation("incident date cannot be after claim date"));
        }
        let id = ClaimId::new_v7();
        let now = Utc::now();
        Ok(Self {
            claim_number: Self::generate_number(&id, claim_date),
            id,
            policy_id,
            claim_type,
            claim_amount,
            approved_amount: None,
            incident_date,
            claim_date,
            status: ClaimStatus::Submitted,
            rejection_reason: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `CLM-YYYYMMDD-XXXXXXXX`
    pub fn generate_number(id: &ClaimId, claim_date: NaiveDate) -> String {
        let simple = id.as_uuid().simple().to_string();
        format!(
            "CLM-{}-{}",
            claim_date.format("%Y%m%d"),
            simple[simple.len() - 8..].to_uppercase()
        )
    }

    fn transition(&mut self, next: ClaimStatus) -> Result<(), PolicyError> {
        if !self.status.can_transition_to(next) {
            return Err(PolicyError::invalid_transition(self.status, next));
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_decided() && self.decided_at.is_none() {
            self.decided_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn start_review(&mut self) -> Result<(), PolicyError> {
        self.transition(ClaimStatus::UnderReview)
    }

    pub fn approve(&mut self, approved_amount: Decimal) -> Result<(), PolicyError> {
        if approved_amount.is_sign_negative() {
            return Err(PolicyError::validation("approved amount cannot be negative"));
        }
        if approved_amount > self.claim_amount {
            return Err(PolicyError::ApprovedAmountExceedsClaim {
                approved: approved_amount.to_string(),
                claimed: self.claim_amount.to_string(),
            });
        }
        self.transition(ClaimStatus::Approved)?;
        self.approved_amount = Some(approved_amount);
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), PolicyError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(PolicyError::MissingRequiredField("rejection_reason".into()));
        }
        self.transition(ClaimStatus::Rejected)?;
        self.rejection_reason = Some(reason);
        Ok(())
    }

    pub fn settle(&mut self) -> Result<(), PolicyError> {
        self.transition(ClaimStatus::Settled)
    }

    pub fn withdraw(&mut self) -> Result<(), PolicyError> {
        self.transition(ClaimStatus::Withdrawn)
    }

    /// Days from claim date to decision, if decided
    pub fn processing_days(&self) -> Option<i64> {
        self.decided_at
            .map(|at| (at.date_naive() - self.claim_date).num_days().max(0))
    }
}
