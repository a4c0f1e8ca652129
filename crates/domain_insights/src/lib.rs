//! Customer Insights Domain
//!
//! Aggregate statistics per customer, computed from the customer's payments,
//! communication log, claims and policy portfolio.
//!
//! The calculators in [`payment`], [`communication`], [`claims`],
//! [`profile`] and [`history`] are pure functions over a loaded
//! [`CustomerRecords`] bundle. [`InsightsService`] loads the bundle through
//! the [`InsightSource`] port, runs the calculators and caches each section
//! as an [`InsightRecord`] through the [`InsightStore`] port.

pub mod records;
pub mod payment;
pub mod communication;
pub mod claims;
pub mod profile;
pub mod history;
pub mod cache;
pub mod summary;
pub mod ports;
pub mod service;
pub mod error;

pub use records::CustomerRecords;
pub use payment::{PaymentInsights, PaymentReliability, PaymentRegularity};
pub use communication::{CommunicationInsights, ContactFrequency};
pub use claims::{ClaimsInsights, RiskLevel, ClaimFrequency};
pub use profile::{ProfileInsights, CustomerSegment, EngagementLevel};
pub use history::{
    PaymentSchedule, ScheduledPayment, PaymentHistory, PaymentYear, PaymentEntry,
    PaymentHistorySummary, CommunicationHistory, CommunicationEntry, ClaimsHistory,
    ClaimEntry, ClaimsHistorySummary,
};
pub use cache::{InsightType, InsightRecord};
pub use summary::{CustomerInsightSummary, InsightFilter, InsightsDashboard, CustomerCounts};
pub use ports::{InsightSource, InsightStore};
pub use service::{InsightsService, CustomerInsights, CustomerInfo, BulkRecalculation, BulkFailure};
pub use error::InsightError;

/// Rounds to one decimal place
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of `part` in `whole` as a percentage, 0 when `whole` is 0
pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
