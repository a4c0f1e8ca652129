//! Payment schedule and per-customer histories

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, CommunicationLogId, PaymentId};
use domain_customer::{CommunicationChannel, CommunicationOutcome};
use domain_policy::{ClaimStatus, ClaimType};
use domain_renewal::{InstallmentStatus, PaymentMode, PaymentStatus};

use crate::payment::most_used_mode;
use crate::records::CustomerRecords;
use crate::{percent, round1};

/// Upcoming installments shown in the schedule
pub const SCHEDULE_LENGTH: usize = 5;
/// Default span of the payment history
pub const DEFAULT_HISTORY_YEARS: u32 = 10;
/// Message previews are cut to this many characters
pub const PREVIEW_CHARS: usize = 100;
pub const RECENT_COMMUNICATIONS: usize = 10;

// ============================================================================
// Payment schedule
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub amount: Decimal,
    pub due_date: NaiveDate,
    /// Policy type of the renewal case
    pub policy: String,
    pub days_until_due: i64,
    pub status: InstallmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub upcoming_payments: Vec<ScheduledPayment>,
    pub next_payment: Option<ScheduledPayment>,
}

impl PaymentSchedule {
    /// Next pending or scheduled installments due on or after `today`
    pub fn compute(records: &CustomerRecords, today: NaiveDate) -> Self {
        let mut upcoming: Vec<_> = records
            .installments
            .iter()
            .filter(|i| matches!(i.status, InstallmentStatus::Pending | InstallmentStatus::Scheduled))
            .filter(|i| i.due_date >= today)
            .collect();
        upcoming.sort_by_key(|i| (i.due_date, i.installment_number));

        let upcoming_payments: Vec<ScheduledPayment> = upcoming
            .into_iter()
            .take(SCHEDULE_LENGTH)
            .map(|i| ScheduledPayment {
                amount: i.amount_due,
                due_date: i.due_date,
                policy: records.case_policy_type_name(i.renewal_case_id),
                days_until_due: (i.due_date - today).num_days(),
                status: i.status,
            })
            .collect();

        Self {
            next_payment: upcoming_payments.first().cloned(),
            upcoming_payments,
        }
    }
}

// ============================================================================
// Payment history
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: PaymentId,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub mode: PaymentMode,
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentYear {
    pub year: i32,
    pub total: Decimal,
    pub payments_count: u32,
    pub payments: Vec<PaymentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistorySummary {
    pub total_premiums_paid: Decimal,
    pub on_time_payment_rate: f64,
    pub total_payments_made: u32,
    pub most_used_mode: Option<PaymentMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHistory {
    /// Newest year first
    pub yearly_breakdown: Vec<PaymentYear>,
    pub summary: PaymentHistorySummary,
}

impl PaymentHistory {
    pub fn compute(records: &CustomerRecords, today: NaiveDate, years: u32) -> Self {
        let start = today - Duration::days(i64::from(years) * 365);
        let mut payments: Vec<_> = records
            .live_payments()
            .filter(|p| p.payment_date.date_naive() >= start)
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));

        let mut by_year: BTreeMap<i32, PaymentYear> = BTreeMap::new();
        for p in &payments {
            let year = p.payment_date.year();
            let entry = by_year.entry(year).or_insert_with(|| PaymentYear {
                year,
                total: Decimal::ZERO,
                payments_count: 0,
                payments: Vec::new(),
            });
            entry.total += p.amount;
            entry.payments_count += 1;
            entry.payments.push(PaymentEntry {
                id: p.id,
                amount: p.amount,
                date: p.payment_date,
                status: p.status,
                mode: p.mode,
                policy: p
                    .renewal_case_id
                    .map(|case_id| records.case_policy_type_name(case_id))
                    .unwrap_or_else(|| "Unknown".to_string()),
            });
        }

        let on_time = payments.iter().filter(|p| p.is_on_time()).count();
        let summary = PaymentHistorySummary {
            total_premiums_paid: payments.iter().map(|p| p.amount).sum(),
            on_time_payment_rate: round1(percent(on_time, payments.len())),
            total_payments_made: payments.len() as u32,
            most_used_mode: most_used_mode(&payments),
        };

        Self {
            yearly_breakdown: by_year.into_values().rev().collect(),
            summary,
        }
    }
}

// ============================================================================
// Communication history
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationEntry {
    pub id: CommunicationLogId,
    pub date: DateTime<Utc>,
    pub channel: CommunicationChannel,
    pub outcome: CommunicationOutcome,
    pub message_content: String,
    pub response_received: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationHistory {
    pub total_communications: u32,
    /// Newest first within each channel
    pub by_channel: BTreeMap<String, Vec<CommunicationEntry>>,
    pub recent_communications: Vec<CommunicationEntry>,
}

impl CommunicationHistory {
    pub fn compute(records: &CustomerRecords) -> Self {
        let mut logs: Vec<_> = records.live_communications().collect();
        logs.sort_by(|a, b| b.communication_date.cmp(&a.communication_date));

        let entries: Vec<CommunicationEntry> = logs
            .iter()
            .map(|log| CommunicationEntry {
                id: log.id,
                date: log.communication_date,
                channel: log.channel,
                outcome: log.outcome,
                message_content: log.preview(PREVIEW_CHARS),
                response_received: log.response_received,
            })
            .collect();

        let mut by_channel: BTreeMap<String, Vec<CommunicationEntry>> = BTreeMap::new();
        for entry in &entries {
            by_channel
                .entry(entry.channel.as_str().to_string())
                .or_default()
                .push(entry.clone());
        }

        Self {
            total_communications: entries.len() as u32,
            by_channel,
            recent_communications: entries.into_iter().take(RECENT_COMMUNICATIONS).collect(),
        }
    }
}

// ============================================================================
// Claims history
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub id: ClaimId,
    pub claim_number: String,
    pub claim_type: ClaimType,
    pub status: ClaimStatus,
    pub policy: String,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub incident_date: NaiveDate,
    pub claim_date: NaiveDate,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsHistorySummary {
    pub total_claims: u32,
    pub approved_claims: u32,
    pub rejected_claims: u32,
    /// Submitted or under review
    pub pending_claims: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsHistory {
    /// Newest claim first
    pub claims: Vec<ClaimEntry>,
    pub summary: ClaimsHistorySummary,
}

impl ClaimsHistory {
    pub fn compute(records: &CustomerRecords) -> Self {
        let mut claims: Vec<_> = records.claims.iter().collect();
        claims.sort_by(|a, b| b.claim_date.cmp(&a.claim_date));

        let count = |pred: fn(ClaimStatus) -> bool| claims.iter().filter(|c| pred(c.status)).count() as u32;
        let summary = ClaimsHistorySummary {
            total_claims: claims.len() as u32,
            approved_claims: count(|s| s.is_approved()),
            rejected_claims: count(|s| s == ClaimStatus::Rejected),
            pending_claims: count(|s| matches!(s, ClaimStatus::Submitted | ClaimStatus::UnderReview)),
        };

        Self {
            claims: claims
                .into_iter()
                .map(|c| ClaimEntry {
                    id: c.id,
                    claim_number: c.claim_number.clone(),
                    claim_type: c.claim_type,
                    status: c.status,
                    policy: records.policy_type_name(c.policy_id),
                    claim_amount: c.claim_amount,
                    approved_amount: c.approved_amount,
                    incident_date: c.incident_date,
                    claim_date: c.claim_date,
                    rejection_reason: c.rejection_reason.clone(),
                })
                .collect(),
            summary,
        }
    }
}
