//! Cross-customer views over cached insights

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::CustomerId;
use domain_customer::Customer;

use crate::claims::{ClaimsInsights, RiskLevel};
use crate::communication::CommunicationInsights;
use crate::payment::{PaymentInsights, PaymentReliability};
use crate::profile::{CustomerSegment, EngagementLevel, ProfileInsights};
use crate::round1;

/// Number of customers listed on the dashboard
pub const RECENT_INSIGHTS: usize = 10;

/// One customer's headline figures, built from all four cached sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInsightSummary {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_code: String,
    pub total_premiums_paid: Decimal,
    pub on_time_payment_rate: f64,
    pub payment_reliability: PaymentReliability,
    pub total_communications: u32,
    pub satisfaction_rating: f64,
    pub total_claims: u32,
    pub approval_rate: f64,
    pub risk_level: RiskLevel,
    pub customer_segment: CustomerSegment,
    pub engagement_level: EngagementLevel,
    /// Oldest calculation time among the sections
    pub last_updated: DateTime<Utc>,
}

impl CustomerInsightSummary {
    pub fn build(
        customer: &Customer,
        payment: &PaymentInsights,
        communication: &CommunicationInsights,
        claims: &ClaimsInsights,
        profile: &ProfileInsights,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            customer_id: customer.id,
            customer_name: customer.full_name(),
            customer_code: customer.customer_code.clone(),
            total_premiums_paid: payment.total_premiums_paid,
            on_time_payment_rate: payment.on_time_payment_rate,
            payment_reliability: payment.payment_reliability,
            total_communications: communication.total_communications,
            satisfaction_rating: communication.satisfaction_rating,
            total_claims: claims.total_claims,
            approval_rate: claims.approval_rate,
            risk_level: claims.risk_level,
            customer_segment: profile.customer_segment,
            engagement_level: profile.engagement_level,
            last_updated,
        }
    }
}

/// Summary filters; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightFilter {
    pub customer_segment: Option<CustomerSegment>,
    pub risk_level: Option<RiskLevel>,
    pub payment_reliability: Option<PaymentReliability>,
    pub engagement_level: Option<EngagementLevel>,
    pub calculated_from: Option<DateTime<Utc>>,
    pub calculated_to: Option<DateTime<Utc>>,
}

impl InsightFilter {
    pub fn matches(&self, summary: &CustomerInsightSummary) -> bool {
        self.customer_segment.map_or(true, |s| s == summary.customer_segment)
            && self.risk_level.map_or(true, |r| r == summary.risk_level)
            && self.payment_reliability.map_or(true, |r| r == summary.payment_reliability)
            && self.engagement_level.map_or(true, |e| e == summary.engagement_level)
            && self.calculated_from.map_or(true, |from| summary.last_updated >= from)
            && self.calculated_to.map_or(true, |to| summary.last_updated <= to)
    }
}

/// Customer counts the dashboard reads from the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCounts {
    pub total_customers: u64,
    /// Customers whose profile is HNI
    pub hni_customers: u64,
    pub customers_with_claims: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsDashboard {
    pub total_customers: u64,
    pub high_value_customers: u64,
    pub customers_with_claims: u64,
    pub avg_satisfaction_rating: f64,
    pub total_premiums_collected: Decimal,
    pub payment_reliability_avg: f64,
    pub recent_insights: Vec<CustomerInsightSummary>,
}

impl InsightsDashboard {
    /// Averages run over every cached payment and communication section
    pub fn compute(
        counts: CustomerCounts,
        payments: &[PaymentInsights],
        communications: &[CommunicationInsights],
        mut summaries: Vec<CustomerInsightSummary>,
    ) -> Self {
        let avg = |values: Vec<f64>| {
            if values.is_empty() {
                0.0
            } else {
                round1(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        summaries.truncate(RECENT_INSIGHTS);

        Self {
            total_customers: counts.total_customers,
            high_value_customers: counts.hni_customers,
            customers_with_claims: counts.customers_with_claims,
            avg_satisfaction_rating: avg(communications.iter().map(|c| c.satisfaction_rating).collect()),
            total_premiums_collected: payments.iter().map(|p| p.total_premiums_paid).sum(),
            payment_reliability_avg: avg(payments.iter().map(|p| p.on_time_payment_rate).collect()),
            recent_insights: summaries,
        }
    }
}
