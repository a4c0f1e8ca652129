//! Payment insights

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::string_enum;
use domain_renewal::{CustomerPayment, PaymentMode};

use crate::{percent, round1};

/// Payments below this count give an unknown reliability
pub const MIN_PAYMENTS_FOR_RELIABILITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentReliability {
    Excellent,
    Good,
    Average,
    Poor,
    Unknown,
}

string_enum!(PaymentReliability, "payment reliability", {
    Excellent => "excellent",
    Good => "good",
    Average => "average",
    Poor => "poor",
    Unknown => "unknown",
});

impl PaymentReliability {
    pub fn rate(on_time_rate: f64, payments: usize) -> Self {
        if payments < MIN_PAYMENTS_FOR_RELIABILITY {
            PaymentReliability::Unknown
        } else if on_time_rate >= 95.0 {
            PaymentReliability::Excellent
        } else if on_time_rate >= 85.0 {
            PaymentReliability::Good
        } else if on_time_rate >= 70.0 {
            PaymentReliability::Average
        } else {
            PaymentReliability::Poor
        }
    }
}

/// How regularly a customer pays, by payment count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRegularity {
    Regular,
    Occasional,
    Infrequent,
    Unknown,
}

string_enum!(PaymentRegularity, "payment frequency", {
    Regular => "regular",
    Occasional => "occasional",
    Infrequent => "infrequent",
    Unknown => "unknown",
});

impl PaymentRegularity {
    pub fn from_count(payments: usize) -> Self {
        match payments {
            0 => PaymentRegularity::Unknown,
            n if n >= 12 => PaymentRegularity::Regular,
            n if n >= 6 => PaymentRegularity::Occasional,
            _ => PaymentRegularity::Infrequent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInsights {
    pub total_premiums_paid: Decimal,
    /// Percentage of payments completed on or before their due date
    pub on_time_payment_rate: f64,
    pub total_payments_made: u32,
    pub most_used_mode: Option<PaymentMode>,
    /// "N days early", "N days late", "On time" or "No data"
    pub average_payment_timing: String,
    pub payment_reliability: PaymentReliability,
    pub average_payment_amount: Decimal,
    pub customer_since_years: u32,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub payment_frequency: PaymentRegularity,
}

impl PaymentInsights {
    pub fn empty() -> Self {
        Self {
            total_premiums_paid: Decimal::ZERO,
            on_time_payment_rate: 0.0,
            total_payments_made: 0,
            most_used_mode: None,
            average_payment_timing: "No data".to_string(),
            payment_reliability: PaymentReliability::Unknown,
            average_payment_amount: Decimal::ZERO,
            customer_since_years: 0,
            last_payment_date: None,
            payment_frequency: PaymentRegularity::Unknown,
        }
    }

    pub fn compute<'a>(
        payments: impl IntoIterator<Item = &'a CustomerPayment>,
        today: NaiveDate,
    ) -> Self {
        let mut payments: Vec<&CustomerPayment> =
            payments.into_iter().filter(|p| !p.is_deleted).collect();
        if payments.is_empty() {
            return Self::empty();
        }
        // newest first
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));

        let count = payments.len();
        let total: Decimal = payments.iter().map(|p| p.amount).sum();
        let on_time = payments.iter().filter(|p| p.is_on_time()).count();
        let on_time_rate = percent(on_time, count);

        let first_payment = payments.last().map(|p| p.payment_date.date_naive());
        let customer_since_years = first_payment
            .map(|first| ((today - first).num_days().max(0) / 365) as u32)
            .unwrap_or(0);

        Self {
            total_premiums_paid: total,
            on_time_payment_rate: round1(on_time_rate),
            total_payments_made: count as u32,
            most_used_mode: most_used_mode(&payments),
            average_payment_timing: average_timing(&payments),
            payment_reliability: PaymentReliability::rate(on_time_rate, count),
            average_payment_amount: (total / Decimal::from(count as u64)).round_dp(2),
            customer_since_years,
            last_payment_date: payments.first().map(|p| p.payment_date),
            payment_frequency: PaymentRegularity::from_count(count),
        }
    }
}

/// Most frequent mode; ties go to the mode of the more recent payment
///
/// `payments` must be sorted newest first.
pub(crate) fn most_used_mode(payments: &[&CustomerPayment]) -> Option<PaymentMode> {
    let mut counts: HashMap<PaymentMode, usize> = HashMap::new();
    for p in payments {
        *counts.entry(p.mode).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    payments
        .iter()
        .map(|p| p.mode)
        .find(|mode| counts.get(mode) == Some(&best))
}

/// Average days between payment and due date, truncated to whole days
fn average_timing(payments: &[&CustomerPayment]) -> String {
    if payments.is_empty() {
        return "No data".to_string();
    }
    let total_days: i64 = payments.iter().map(|p| p.days_early()).sum();
    let average = total_days as f64 / payments.len() as f64;
    let days = average.abs().trunc() as i64;
    if average > 0.0 {
        format!("{} days early", days)
    } else if average < 0.0 {
        format!("{} days late", days)
    } else {
        "On time".to_string()
    }
}
