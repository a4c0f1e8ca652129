//! Renewal case aggregate

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, CustomerId, PolicyId, RenewalCaseId};

use crate::error::RenewalError;

/// Where a renewal case is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Expired,
    Due,
    Overdue,
    NotRequired,
    Assigned,
    Failed,
    Uploaded,
    Renewed,
    PendingAction,
}

string_enum!(RenewalStatus, "renewal status", {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    Expired => "expired",
    Due => "due",
    Overdue => "overdue",
    NotRequired => "not_required",
    Assigned => "assigned",
    Failed => "failed",
    Uploaded => "uploaded",
    Renewed => "renewed",
    PendingAction => "pending_action",
});

impl RenewalStatus {
    /// Terminal statuses; a case in one of these no longer changes
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            RenewalStatus::Completed
                | RenewalStatus::Cancelled
                | RenewalStatus::Expired
                | RenewalStatus::NotRequired
                | RenewalStatus::Renewed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Urgent,
}

string_enum!(CasePriority, "case priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

/// Payment status of a renewal case, derived from its payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPaymentStatus {
    Pending,
    Success,
    Failed,
}

string_enum!(RenewalPaymentStatus, "renewal payment status", {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

/// Sales channel a renewal is worked through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalChannel {
    Online,
    Telecalling,
    Partner,
    CallCenter,
    Branch,
    WalkIn,
    Referral,
}

string_enum!(RenewalChannel, "renewal channel", {
    Online => "online",
    Telecalling => "telecalling",
    Partner => "partner",
    CallCenter => "call_center",
    Branch => "branch",
    WalkIn => "walk_in",
    Referral => "referral",
});

/// Where the renewal lead came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSource {
    Website,
    MobileApp,
    Outbound,
    Inbound,
    BankChannel,
    TravelAgent,
    CorporateBroker,
    DirectVisit,
    PhoneCall,
}

string_enum!(ChannelSource, "channel source", {
    Website => "website",
    MobileApp => "mobile_app",
    Outbound => "outbound",
    Inbound => "inbound",
    BankChannel => "bank_channel",
    TravelAgent => "travel_agent",
    CorporateBroker => "corporate_broker",
    DirectVisit => "direct_visit",
    PhoneCall => "phone_call",
});

/// A policy's renewal workflow record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalCase {
    pub id: RenewalCaseId,
    /// `RC-YYYYMMDD-XXXXXXXX`, unique
    pub case_number: String,
    /// Import batch the case arrived in
    pub batch_code: String,
    pub policy_id: PolicyId,
    pub customer_id: CustomerId,
    pub status: RenewalStatus,
    pub priority: CasePriority,
    pub assigned_to: Option<String>,
    pub renewal_amount: Decimal,
    pub payment_status: RenewalPaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub communication_attempts: u32,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub channel: Option<RenewalChannel>,
    pub channel_source: Option<ChannelSource>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenewalCase {
    pub fn open(
        policy_id: PolicyId,
        customer_id: CustomerId,
        batch_code: impl Into<String>,
        renewal_amount: Decimal,
    ) -> Result<Self, RenewalError> {
        if renewal_amount.is_sign_negative() {
            return Err(RenewalError::InvalidAmount(renewal_amount.to_string()));
        }
        let id = RenewalCaseId::new_v7();
        let now = Utc::now();
        Ok(Self {
            case_number: Self::generate_case_number(&id, now.date_naive()),
            id,
            batch_code: batch_code.into(),
            policy_id,
            customer_id,
            status: RenewalStatus::Pending,
            priority: CasePriority::Medium,
            assigned_to: None,
            renewal_amount,
            payment_status: RenewalPaymentStatus::Pending,
            payment_date: None,
            communication_attempts: 0,
            last_contact_date: None,
            channel: None,
            channel_source: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn generate_case_number(id: &RenewalCaseId, on: NaiveDate) -> String {
        let simple = id.as_uuid().simple().to_string();
        format!(
            "RC-{}-{}",
            on.format("%Y%m%d"),
            simple[simple.len() - 8..].to_uppercase()
        )
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    fn ensure_open(&self) -> Result<(), RenewalError> {
        if self.is_closed() {
            return Err(RenewalError::CaseClosed {
                case_number: self.case_number.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Moves the case to `next`; closed cases only accept their own status
    pub fn set_status(&mut self, next: RenewalStatus) -> Result<(), RenewalError> {
        if self.status == next {
            return Ok(());
        }
        self.ensure_open()?;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn assign(&mut self, user: impl Into<String>) -> Result<(), RenewalError> {
        let user = user.into();
        if user.trim().is_empty() {
            return Err(RenewalError::validation("assignee is required"));
        }
        self.ensure_open()?;
        self.assigned_to = Some(user);
        self.status = RenewalStatus::Assigned;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Counts a contact attempt; `last_contact_date` never moves backwards
    pub fn record_contact(&mut self, at: DateTime<Utc>) -> Result<(), RenewalError> {
        self.ensure_open()?;
        self.communication_attempts += 1;
        self.last_contact_date = Some(match self.last_contact_date {
            Some(prev) if prev > at => prev,
            _ => at,
        });
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn case() -> RenewalCase {
        RenewalCase::open(PolicyId::new(), CustomerId::new(), "BATCH-2024-07-25-A", dec!(15000))
            .unwrap()
    }

    #[test]
    fn test_case_number_format() {
        let c = case();
        assert!(c.case_number.starts_with("RC-"));
        assert_eq!(c.case_number.len(), 20);
    }

    #[test]
    fn test_record_contact_is_monotonic() {
        let mut c = case();
        let now = Utc::now();
        c.record_contact(now).unwrap();
        c.record_contact(now - Duration::days(2)).unwrap();
        assert_eq!(c.communication_attempts, 2);
        assert_eq!(c.last_contact_date, Some(now));
    }

    #[test]
    fn test_closed_case_rejects_changes() {
        let mut c = case();
        c.set_status(RenewalStatus::Renewed).unwrap();
        assert!(c.set_status(RenewalStatus::Renewed).is_ok());
        assert!(matches!(
            c.set_status(RenewalStatus::InProgress),
            Err(RenewalError::CaseClosed { .. })
        ));
        assert!(c.assign("agent-7").is_err());
        assert!(c.record_contact(Utc::now()).is_err());
    }
}
