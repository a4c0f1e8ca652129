//! Email provider configuration
//!
//! Secret fields are stored encrypted (see [`crate::vault`]); everything on
//! [`EmailProviderConfig`] is safe to persist and log except those fields,
//! which the `Debug` impl redacts.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, AdapterHealth, ProviderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Sendgrid,
    AwsSes,
    Smtp,
}

string_enum!(ProviderType, "provider type", {
    Sendgrid => "sendgrid",
    AwsSes => "aws_ses",
    Smtp => "smtp",
});

/// Why a provider cannot take a message right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Inactive,
    Unhealthy(String),
    DailyLimit,
    MonthlyLimit,
    RateLimited,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Inactive => write!(f, "Provider is inactive"),
            BlockReason::Unhealthy(msg) => write!(f, "Provider is unhealthy: {}", msg),
            BlockReason::DailyLimit => write!(f, "Daily limit reached"),
            BlockReason::MonthlyLimit => write!(f, "Monthly limit reached"),
            BlockReason::RateLimited => write!(f, "Per-minute rate limit reached"),
        }
    }
}

/// Encrypted secret fields, each `base64(nonce || ciphertext)` or empty
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSecrets {
    pub api_key: String,
    pub api_secret: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub smtp_password: String,
}

impl fmt::Debug for ProviderSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |s: &str| if s.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ProviderSecrets")
            .field("api_key", &mark(&self.api_key))
            .field("api_secret", &mark(&self.api_secret))
            .field("access_key_id", &mark(&self.access_key_id))
            .field("secret_access_key", &mark(&self.secret_access_key))
            .field("smtp_password", &mark(&self.smtp_password))
            .finish()
    }
}

/// An email provider and its runtime state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailProviderConfig {
    pub id: ProviderId,
    pub name: String,
    pub provider_type: ProviderType,
    pub is_default: bool,
    pub is_active: bool,
    /// 1 is tried first
    pub priority: u32,

    #[serde(skip_serializing, default)]
    pub secrets: ProviderSecrets,
    pub region: Option<String>,

    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_use_tls: bool,
    pub smtp_use_ssl: bool,

    pub from_email: String,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,

    pub daily_limit: u32,
    pub monthly_limit: u32,
    pub rate_limit_per_minute: u32,

    pub health_status: AdapterHealth,
    pub last_health_check: Option<DateTime<Utc>>,
    pub health_error_message: Option<String>,
    pub consecutive_failures: u32,

    pub emails_sent_today: u32,
    pub emails_sent_this_month: u32,
    pub last_reset_daily: NaiveDate,
    pub last_reset_monthly: NaiveDate,
    /// Start of the current per-minute window
    pub minute_window_start: Option<DateTime<Utc>>,
    pub emails_sent_this_minute: u32,

    pub total_emails_sent: u64,
    pub total_emails_failed: u64,
    pub average_response_time_ms: f64,

    pub additional_settings: serde_json::Value,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailProviderConfig {
    pub fn new(
        name: impl Into<String>,
        provider_type: ProviderType,
        from_email: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProviderId::new_v7(),
            name: name.into(),
            provider_type,
            is_default: false,
            is_active: true,
            priority: 1,
            secrets: ProviderSecrets::default(),
            region: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_use_tls: true,
            smtp_use_ssl: false,
            from_email: from_email.into(),
            from_name: None,
            reply_to: None,
            daily_limit: 10_000,
            monthly_limit: 100_000,
            rate_limit_per_minute: 100,
            health_status: AdapterHealth::Unknown,
            last_health_check: None,
            health_error_message: None,
            consecutive_failures: 0,
            emails_sent_today: 0,
            emails_sent_this_month: 0,
            last_reset_daily: now.date_naive(),
            last_reset_monthly: now.date_naive(),
            minute_window_start: None,
            emails_sent_this_minute: 0,
            total_emails_sent: 0,
            total_emails_failed: 0,
            average_response_time_ms: 0.0,
            additional_settings: serde_json::json!({}),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Checks whether the provider may send at `now`
    ///
    /// Callers roll the usage windows first so stale counters do not block.
    pub fn can_send(&self, now: DateTime<Utc>) -> Result<(), BlockReason> {
        if !self.is_active || self.is_deleted {
            return Err(BlockReason::Inactive);
        }
        if self.health_status == AdapterHealth::Unhealthy {
            return Err(BlockReason::Unhealthy(
                self.health_error_message.clone().unwrap_or_default(),
            ));
        }
        if self.emails_sent_today >= self.daily_limit {
            return Err(BlockReason::DailyLimit);
        }
        if self.emails_sent_this_month >= self.monthly_limit {
            return Err(BlockReason::MonthlyLimit);
        }
        if self.in_current_minute(now) && self.emails_sent_this_minute >= self.rate_limit_per_minute {
            return Err(BlockReason::RateLimited);
        }
        Ok(())
    }

    fn in_current_minute(&self, now: DateTime<Utc>) -> bool {
        self.minute_window_start
            .map(|start| start.date_naive() == now.date_naive()
                && start.hour() == now.hour()
                && start.minute() == now.minute())
            .unwrap_or(false)
    }

    /// Records a health observation
    pub fn update_health(&mut self, status: AdapterHealth, error: Option<String>) {
        self.health_status = status;
        self.health_error_message = error;
        self.last_health_check = Some(Utc::now());
        if status == AdapterHealth::Unhealthy {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
        self.updated_at = Utc::now();
    }

    /// Resets the daily and monthly counters when their period has passed
    ///
    /// Returns true if anything was reset.
    pub fn roll_usage_windows(&mut self, today: NaiveDate) -> bool {
        let mut rolled = false;
        if today != self.last_reset_daily {
            self.emails_sent_today = 0;
            self.last_reset_daily = today;
            rolled = true;
        }
        if (today.year(), today.month())
            != (self.last_reset_monthly.year(), self.last_reset_monthly.month())
        {
            self.emails_sent_this_month = 0;
            self.last_reset_monthly = today;
            rolled = true;
        }
        rolled
    }

    /// Claims one send in the usage windows if the provider may send at `now`
    ///
    /// Stores apply this under a lock so concurrent senders cannot both take
    /// the last slot.
    pub fn reserve_slot(&mut self, now: DateTime<Utc>) -> Result<(), BlockReason> {
        self.roll_usage_windows(now.date_naive());
        self.can_send(now)?;
        self.count_send(now);
        Ok(())
    }

    /// Gives back a slot taken by [`reserve_slot`](Self::reserve_slot)
    pub fn release_slot(&mut self) {
        self.emails_sent_today = self.emails_sent_today.saturating_sub(1);
        self.emails_sent_this_month = self.emails_sent_this_month.saturating_sub(1);
        self.emails_sent_this_minute = self.emails_sent_this_minute.saturating_sub(1);
    }

    /// Records the outcome of a send made through a reserved slot
    ///
    /// A failed send releases its slot; only delivered messages count
    /// against the limits.
    pub fn complete_attempt(&mut self, success: bool, elapsed_ms: u64, now: DateTime<Utc>) {
        if !success {
            self.release_slot();
        }
        self.record_outcome(success, elapsed_ms, now);
    }

    /// Updates usage counters and the running response time average for a
    /// send that took no reservation
    pub fn record_attempt(&mut self, success: bool, elapsed_ms: u64, now: DateTime<Utc>) {
        if success {
            self.count_send(now);
        }
        self.record_outcome(success, elapsed_ms, now);
    }

    fn count_send(&mut self, now: DateTime<Utc>) {
        self.emails_sent_today += 1;
        self.emails_sent_this_month += 1;
        if self.in_current_minute(now) {
            self.emails_sent_this_minute += 1;
        } else {
            self.minute_window_start = Some(now);
            self.emails_sent_this_minute = 1;
        }
    }

    fn record_outcome(&mut self, success: bool, elapsed_ms: u64, now: DateTime<Utc>) {
        if success {
            self.total_emails_sent += 1;
        } else {
            self.total_emails_failed += 1;
        }

        let attempts = (self.total_emails_sent + self.total_emails_failed) as f64;
        self.average_response_time_ms =
            (self.average_response_time_ms * (attempts - 1.0) + elapsed_ms as f64) / attempts;
        self.updated_at = now;
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.is_active = false;
        self.is_default = false;
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for EmailProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.provider_type)
    }
}

/// Orders providers the way delivery walks them
pub fn sort_for_delivery(providers: &mut [EmailProviderConfig]) {
    providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn provider() -> EmailProviderConfig {
        EmailProviderConfig::new("SendGrid Primary", ProviderType::Sendgrid, "noreply@example.com")
    }

    #[test]
    fn test_unhealthy_blocks_and_counts_failures() {
        let mut p = provider();
        p.update_health(AdapterHealth::Unhealthy, Some("401".into()));
        p.update_health(AdapterHealth::Unhealthy, Some("401".into()));
        assert_eq!(p.consecutive_failures, 2);
        assert_eq!(p.can_send(Utc::now()), Err(BlockReason::Unhealthy("401".into())));

        p.update_health(AdapterHealth::Degraded, None);
        assert_eq!(p.consecutive_failures, 0);
        assert!(p.can_send(Utc::now()).is_ok());
    }

    #[test]
    fn test_limits() {
        let now = Utc::now();
        let mut p = provider();
        p.daily_limit = 1;
        p.record_attempt(true, 100, now);
        assert_eq!(p.can_send(now), Err(BlockReason::DailyLimit));

        p.roll_usage_windows(now.date_naive() + Duration::days(1));
        assert_eq!(p.emails_sent_today, 0);
        assert!(p.can_send(now + Duration::days(1)).is_ok());
    }

    #[test]
    fn test_per_minute_window() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 5).unwrap();
        let mut p = provider();
        p.rate_limit_per_minute = 2;
        p.record_attempt(true, 10, t0);
        p.record_attempt(true, 10, t0 + Duration::seconds(20));
        assert_eq!(p.can_send(t0 + Duration::seconds(30)), Err(BlockReason::RateLimited));
        assert!(p.can_send(t0 + Duration::seconds(60)).is_ok());
    }

    #[test]
    fn test_monthly_roll() {
        let mut p = provider();
        p.last_reset_daily = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        p.last_reset_monthly = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        p.emails_sent_this_month = 500;
        assert!(p.roll_usage_windows(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert_eq!(p.emails_sent_this_month, 0);
    }

    #[test]
    fn test_running_average() {
        let now = Utc::now();
        let mut p = provider();
        p.record_attempt(true, 100, now);
        p.record_attempt(false, 300, now);
        assert_eq!(p.average_response_time_ms, 200.0);
        assert_eq!(p.total_emails_failed, 1);
        assert_eq!(p.emails_sent_today, 1);
    }

    #[test]
    fn test_reservation_holds_the_last_slot() {
        let now = Utc::now();
        let mut p = provider();
        p.daily_limit = 1;
        assert!(p.reserve_slot(now).is_ok());
        assert_eq!(p.emails_sent_today, 1);
        assert_eq!(p.reserve_slot(now), Err(BlockReason::DailyLimit));

        p.complete_attempt(false, 40, now);
        assert_eq!(p.emails_sent_today, 0);
        assert_eq!(p.total_emails_failed, 1);
        assert!(p.reserve_slot(now).is_ok());

        p.complete_attempt(true, 60, now);
        assert_eq!(p.emails_sent_today, 1);
        assert_eq!(p.total_emails_sent, 1);
        assert_eq!(p.average_response_time_ms, 50.0);
    }

    #[test]
    fn test_reservation_rolls_stale_day() {
        let now = Utc::now();
        let mut p = provider();
        p.daily_limit = 1;
        p.emails_sent_today = 1;
        p.last_reset_daily = now.date_naive() - Duration::days(1);
        assert!(p.reserve_slot(now).is_ok());
        assert_eq!(p.last_reset_daily, now.date_naive());
        assert_eq!(p.emails_sent_today, 1);
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let mut p = provider();
        p.secrets.api_key = "cipher".into();
        let debug = format!("{:?}", p);
        assert!(!debug.contains("cipher"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_delivery_order() {
        let mut list = vec![
            provider().with_priority(2),
            EmailProviderConfig::new("B", ProviderType::Smtp, "a@b.c").with_priority(1),
            EmailProviderConfig::new("A", ProviderType::AwsSes, "a@b.c").with_priority(1),
        ];
        sort_for_delivery(&mut list);
        let names: Vec<_> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "SendGrid Primary"]);
    }

    proptest::proptest! {
        #[test]
        fn average_response_time_is_bounded(
            attempts in proptest::collection::vec((proptest::bool::ANY, 1u64..60_000), 1..50)
        ) {
            let mut p = provider();
            let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
            for &(success, elapsed) in &attempts {
                p.record_attempt(success, elapsed, now);
            }
            let min = attempts.iter().map(|a| a.1).min().unwrap() as f64;
            let max = attempts.iter().map(|a| a.1).max().unwrap() as f64;

            proptest::prop_assert!(p.average_response_time_ms >= min - 1e-6);
            proptest::prop_assert!(p.average_response_time_ms <= max + 1e-6);
            proptest::prop_assert_eq!(
                (p.total_emails_sent + p.total_emails_failed) as usize,
                attempts.len()
            );
        }
    }
}
