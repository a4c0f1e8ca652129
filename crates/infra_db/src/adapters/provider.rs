//! PostgreSQL email provider store
//!
//! Implements [`ProviderStore`] over the `email_providers` table and its
//! three log tables. Secret columns hold the vault's sealed form and are
//! written and read back verbatim.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError, ProviderId};
use domain_messaging::{
    EmailProviderConfig, ProviderHealthLog, ProviderSecrets, ProviderStore, ProviderTestResult,
    ProviderUsageLog, Reservation,
};

use crate::error::{count_column, parse_column, DatabaseError};

const PROVIDER_COLUMNS: &str = "id, name, provider_type, is_default, is_active, priority, \
    api_key, api_secret, access_key_id, secret_access_key, smtp_password, region, \
    smtp_host, smtp_port, smtp_username, smtp_use_tls, smtp_use_ssl, from_email, from_name, reply_to, \
    daily_limit, monthly_limit, rate_limit_per_minute, health_status, last_health_check, \
    health_error_message, consecutive_failures, emails_sent_today, emails_sent_this_month, \
    last_reset_daily, last_reset_monthly, minute_window_start, emails_sent_this_minute, \
    total_emails_sent, total_emails_failed, average_response_time_ms, additional_settings, \
    is_deleted, created_at, updated_at";

/// Active providers first, then delivery order
const PROVIDER_ORDER: &str = "ORDER BY is_active DESC, priority, name";

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProviderRow {
    id: Uuid,
    name: String,
    provider_type: String,
    is_default: bool,
    is_active: bool,
    priority: i32,
    api_key: String,
    api_secret: String,
    access_key_id: String,
    secret_access_key: String,
    smtp_password: String,
    region: Option<String>,
    smtp_host: Option<String>,
    smtp_port: i32,
    smtp_username: Option<String>,
    smtp_use_tls: bool,
    smtp_use_ssl: bool,
    from_email: String,
    from_name: Option<String>,
    reply_to: Option<String>,
    daily_limit: i32,
    monthly_limit: i32,
    rate_limit_per_minute: i32,
    health_status: String,
    last_health_check: Option<DateTime<Utc>>,
    health_error_message: Option<String>,
    consecutive_failures: i32,
    emails_sent_today: i32,
    emails_sent_this_month: i32,
    last_reset_daily: NaiveDate,
    last_reset_monthly: NaiveDate,
    minute_window_start: Option<DateTime<Utc>>,
    emails_sent_this_minute: i32,
    total_emails_sent: i64,
    total_emails_failed: i64,
    average_response_time_ms: f64,
    additional_settings: serde_json::Value,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderRow> for EmailProviderConfig {
    type Error = DatabaseError;

    fn try_from(row: ProviderRow) -> Result<Self, Self::Error> {
        let smtp_port = u16::try_from(row.smtp_port).map_err(|_| DatabaseError::Decode {
            column: "smtp_port",
            message: format!("out of range: {}", row.smtp_port),
        })?;
        Ok(EmailProviderConfig {
            id: ProviderId::from_uuid(row.id),
            name: row.name,
            provider_type: parse_column("provider_type", &row.provider_type)?,
            is_default: row.is_default,
            is_active: row.is_active,
            priority: count_column("priority", row.priority)?,
            secrets: ProviderSecrets {
                api_key: row.api_key,
                api_secret: row.api_secret,
                access_key_id: row.access_key_id,
                secret_access_key: row.secret_access_key,
                smtp_password: row.smtp_password,
            },
            region: row.region,
            smtp_host: row.smtp_host,
            smtp_port,
            smtp_username: row.smtp_username,
            smtp_use_tls: row.smtp_use_tls,
            smtp_use_ssl: row.smtp_use_ssl,
            from_email: row.from_email,
            from_name: row.from_name,
            reply_to: row.reply_to,
            daily_limit: count_column("daily_limit", row.daily_limit)?,
            monthly_limit: count_column("monthly_limit", row.monthly_limit)?,
            rate_limit_per_minute: count_column("rate_limit_per_minute", row.rate_limit_per_minute)?,
            health_status: parse_column("health_status", &row.health_status)?,
            last_health_check: row.last_health_check,
            health_error_message: row.health_error_message,
            consecutive_failures: count_column("consecutive_failures", row.consecutive_failures)?,
            emails_sent_today: count_column("emails_sent_today", row.emails_sent_today)?,
            emails_sent_this_month: count_column("emails_sent_this_month", row.emails_sent_this_month)?,
            last_reset_daily: row.last_reset_daily,
            last_reset_monthly: row.last_reset_monthly,
            minute_window_start: row.minute_window_start,
            emails_sent_this_minute: count_column("emails_sent_this_minute", row.emails_sent_this_minute)?,
            total_emails_sent: row.total_emails_sent.max(0) as u64,
            total_emails_failed: row.total_emails_failed.max(0) as u64,
            average_response_time_ms: row.average_response_time_ms,
            additional_settings: row.additional_settings,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct HealthLogRow {
    id: Uuid,
    provider_id: Uuid,
    status: String,
    response_time_ms: i64,
    error_message: Option<String>,
    test_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HealthLogRow> for ProviderHealthLog {
    type Error = DatabaseError;

    fn try_from(row: HealthLogRow) -> Result<Self, Self::Error> {
        Ok(ProviderHealthLog {
            id: row.id,
            provider_id: ProviderId::from_uuid(row.provider_id),
            status: parse_column("status", &row.status)?,
            response_time_ms: row.response_time_ms.max(0) as u64,
            error_message: row.error_message,
            test_type: parse_column("test_type", &row.test_type)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UsageLogRow {
    provider_id: Uuid,
    date: NaiveDate,
    emails_sent: i32,
    emails_failed: i32,
    total_response_time_ms: i64,
}

impl TryFrom<UsageLogRow> for ProviderUsageLog {
    type Error = DatabaseError;

    fn try_from(row: UsageLogRow) -> Result<Self, Self::Error> {
        Ok(ProviderUsageLog {
            provider_id: ProviderId::from_uuid(row.provider_id),
            date: row.date,
            emails_sent: count_column("emails_sent", row.emails_sent)?,
            emails_failed: count_column("emails_failed", row.emails_failed)?,
            total_response_time_ms: row.total_response_time_ms.max(0) as u64,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TestResultRow {
    id: Uuid,
    provider_id: Uuid,
    test_type: String,
    status: String,
    message: String,
    response_time_ms: Option<i64>,
    test_data: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TestResultRow> for ProviderTestResult {
    type Error = DatabaseError;

    fn try_from(row: TestResultRow) -> Result<Self, Self::Error> {
        Ok(ProviderTestResult {
            id: row.id,
            provider_id: ProviderId::from_uuid(row.provider_id),
            test_type: parse_column("test_type", &row.test_type)?,
            status: parse_column("status", &row.status)?,
            message: row.message,
            response_time_ms: row.response_time_ms.map(|ms| ms.max(0) as u64),
            test_data: row.test_data,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed [`ProviderStore`]
#[derive(Debug, Clone)]
pub struct PostgresProviderStore {
    pool: PgPool,
}

impl PostgresProviderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: ProviderId) -> Result<EmailProviderConfig, DatabaseError> {
        sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM email_providers WHERE id = $1 AND NOT is_deleted",
            PROVIDER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("EmailProvider", id))?
        .try_into()
    }

    async fn fetch_where(&self, condition: &str) -> Result<Vec<EmailProviderConfig>, DatabaseError> {
        sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM email_providers WHERE {} {}",
            PROVIDER_COLUMNS, condition, PROVIDER_ORDER
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(EmailProviderConfig::try_from)
        .collect()
    }
}

impl PostgresProviderStore {
    /// Locks the provider row, applies `change` and writes the runtime state
    /// back in the same transaction
    async fn mutate<T, F>(&self, id: ProviderId, change: F) -> Result<(EmailProviderConfig, T), DatabaseError>
    where
        F: FnOnce(&mut EmailProviderConfig) -> T + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut provider: EmailProviderConfig = sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM email_providers WHERE id = $1 AND NOT is_deleted FOR UPDATE",
            PROVIDER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("EmailProvider", id))?
        .try_into()?;

        let output = change(&mut provider);
        write_state(&mut tx, &provider).await?;
        tx.commit().await?;
        Ok((provider, output))
    }
}

/// Writes health, usage counters and totals
async fn write_state(conn: &mut PgConnection, provider: &EmailProviderConfig) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE email_providers
         SET health_status = $2, last_health_check = $3, health_error_message = $4,
             consecutive_failures = $5, emails_sent_today = $6, emails_sent_this_month = $7,
             last_reset_daily = $8, last_reset_monthly = $9, minute_window_start = $10,
             emails_sent_this_minute = $11, total_emails_sent = $12, total_emails_failed = $13,
             average_response_time_ms = $14, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(provider.id.as_uuid())
    .bind(provider.health_status.as_str())
    .bind(provider.last_health_check)
    .bind(&provider.health_error_message)
    .bind(provider.consecutive_failures as i32)
    .bind(provider.emails_sent_today as i32)
    .bind(provider.emails_sent_this_month as i32)
    .bind(provider.last_reset_daily)
    .bind(provider.last_reset_monthly)
    .bind(provider.minute_window_start)
    .bind(provider.emails_sent_this_minute as i32)
    .bind(provider.total_emails_sent as i64)
    .bind(provider.total_emails_failed as i64)
    .bind(provider.average_response_time_ms)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Clears the default flag everywhere except on `keep`
async fn clear_default(conn: &mut PgConnection, keep: ProviderId) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE email_providers SET is_default = FALSE, updated_at = NOW() WHERE is_default AND id <> $1")
        .bind(keep.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl DomainPort for PostgresProviderStore {}

#[async_trait]
impl HealthCheckable for PostgresProviderStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::new("postgres-provider-store", AdapterHealth::Healthy, latency_ms, None),
            Err(e) => HealthCheckResult::new(
                "postgres-provider-store",
                AdapterHealth::Unhealthy,
                latency_ms,
                Some(format!("Database health check failed: {}", e)),
            ),
        }
    }
}

#[async_trait]
impl ProviderStore for PostgresProviderStore {
    async fn list_providers(&self) -> Result<Vec<EmailProviderConfig>, PortError> {
        Ok(self.fetch_where("NOT is_deleted").await?)
    }

    async fn list_active(&self) -> Result<Vec<EmailProviderConfig>, PortError> {
        Ok(self.fetch_where("is_active AND NOT is_deleted").await?)
    }

    async fn get_provider(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError> {
        Ok(self.fetch(id).await?)
    }

    #[instrument(skip(self, provider), fields(provider = %provider.name))]
    async fn create_provider(&self, provider: EmailProviderConfig) -> Result<EmailProviderConfig, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        if provider.is_default {
            clear_default(&mut tx, provider.id).await?;
        }

        let secrets = &provider.secrets;
        let row = sqlx::query_as::<_, ProviderRow>(&format!(
            "INSERT INTO email_providers ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                     $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34, $35, $36, $37, $38, $39, $40)
             RETURNING {}",
            PROVIDER_COLUMNS, PROVIDER_COLUMNS
        ))
        .bind(provider.id.as_uuid())
        .bind(&provider.name)
        .bind(provider.provider_type.as_str())
        .bind(provider.is_default)
        .bind(provider.is_active)
        .bind(provider.priority as i32)
        .bind(&secrets.api_key)
        .bind(&secrets.api_secret)
        .bind(&secrets.access_key_id)
        .bind(&secrets.secret_access_key)
        .bind(&secrets.smtp_password)
        .bind(&provider.region)
        .bind(&provider.smtp_host)
        .bind(i32::from(provider.smtp_port))
        .bind(&provider.smtp_username)
        .bind(provider.smtp_use_tls)
        .bind(provider.smtp_use_ssl)
        .bind(&provider.from_email)
        .bind(&provider.from_name)
        .bind(&provider.reply_to)
        .bind(provider.daily_limit as i32)
        .bind(provider.monthly_limit as i32)
        .bind(provider.rate_limit_per_minute as i32)
        .bind(provider.health_status.as_str())
        .bind(provider.last_health_check)
        .bind(&provider.health_error_message)
        .bind(provider.consecutive_failures as i32)
        .bind(provider.emails_sent_today as i32)
        .bind(provider.emails_sent_this_month as i32)
        .bind(provider.last_reset_daily)
        .bind(provider.last_reset_monthly)
        .bind(provider.minute_window_start)
        .bind(provider.emails_sent_this_minute as i32)
        .bind(provider.total_emails_sent as i64)
        .bind(provider.total_emails_failed as i64)
        .bind(provider.average_response_time_ms)
        .bind(&provider.additional_settings)
        .bind(provider.is_deleted)
        .bind(provider.created_at)
        .bind(provider.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Email provider created");
        Ok(row.try_into()?)
    }

    #[instrument(skip(self, provider), fields(provider_id = %provider.id))]
    async fn update_provider(&self, provider: EmailProviderConfig) -> Result<EmailProviderConfig, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        if provider.is_default {
            clear_default(&mut tx, provider.id).await?;
        }

        let secrets = &provider.secrets;
        let row = sqlx::query_as::<_, ProviderRow>(&format!(
            "UPDATE email_providers
             SET name = $2, provider_type = $3, is_default = $4, is_active = $5, priority = $6,
                 api_key = $7, api_secret = $8, access_key_id = $9, secret_access_key = $10,
                 smtp_password = $11, region = $12, smtp_host = $13, smtp_port = $14,
                 smtp_username = $15, smtp_use_tls = $16, smtp_use_ssl = $17, from_email = $18,
                 from_name = $19, reply_to = $20, daily_limit = $21, monthly_limit = $22,
                 rate_limit_per_minute = $23, additional_settings = $24, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            PROVIDER_COLUMNS
        ))
        .bind(provider.id.as_uuid())
        .bind(&provider.name)
        .bind(provider.provider_type.as_str())
        .bind(provider.is_default)
        .bind(provider.is_active)
        .bind(provider.priority as i32)
        .bind(&secrets.api_key)
        .bind(&secrets.api_secret)
        .bind(&secrets.access_key_id)
        .bind(&secrets.secret_access_key)
        .bind(&secrets.smtp_password)
        .bind(&provider.region)
        .bind(&provider.smtp_host)
        .bind(i32::from(provider.smtp_port))
        .bind(&provider.smtp_username)
        .bind(provider.smtp_use_tls)
        .bind(provider.smtp_use_ssl)
        .bind(&provider.from_email)
        .bind(&provider.from_name)
        .bind(&provider.reply_to)
        .bind(provider.daily_limit as i32)
        .bind(provider.monthly_limit as i32)
        .bind(provider.rate_limit_per_minute as i32)
        .bind(&provider.additional_settings)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("EmailProvider", provider.id))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(row.try_into()?)
    }

    #[instrument(skip(self), fields(provider_id = %id))]
    async fn reserve_send(&self, id: ProviderId, now: DateTime<Utc>) -> Result<Reservation, PortError> {
        let (provider, reserved) = self.mutate(id, move |p| p.reserve_slot(now)).await?;
        Ok(match reserved {
            Ok(()) => Reservation::Reserved(provider),
            Err(reason) => Reservation::Blocked(reason),
        })
    }

    async fn complete_send(
        &self,
        id: ProviderId,
        success: bool,
        elapsed_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.mutate(id, move |p| p.complete_attempt(success, elapsed_ms, now))
            .await?;
        Ok(())
    }

    async fn record_attempt(
        &self,
        id: ProviderId,
        success: bool,
        elapsed_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<(), PortError> {
        self.mutate(id, move |p| p.record_attempt(success, elapsed_ms, now))
            .await?;
        Ok(())
    }

    async fn update_health(
        &self,
        id: ProviderId,
        status: AdapterHealth,
        error: Option<String>,
    ) -> Result<EmailProviderConfig, PortError> {
        Ok(self.mutate(id, move |p| p.update_health(status, error)).await?.0)
    }

    #[instrument(skip(self), fields(provider_id = %id))]
    async fn set_default(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        clear_default(&mut tx, id).await?;

        let row = sqlx::query_as::<_, ProviderRow>(&format!(
            "UPDATE email_providers SET is_default = TRUE, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            PROVIDER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("EmailProvider", id))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(row.try_into()?)
    }

    async fn delete_provider(&self, id: ProviderId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE email_providers
             SET is_deleted = TRUE, is_active = FALSE, is_default = FALSE, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("EmailProvider", id));
        }
        Ok(())
    }

    async fn record_health_log(&self, log: ProviderHealthLog) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO email_provider_health_logs
                 (id, provider_id, status, response_time_ms, error_message, test_type, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(log.id)
        .bind(log.provider_id.as_uuid())
        .bind(log.status.as_str())
        .bind(log.response_time_ms as i64)
        .bind(&log.error_message)
        .bind(log.test_type.as_str())
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn record_usage(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        success: bool,
        elapsed_ms: u64,
    ) -> Result<(), PortError> {
        let (sent, failed) = if success { (1, 0) } else { (0, 1) };
        sqlx::query(
            "INSERT INTO email_provider_usage_logs
                 (provider_id, date, emails_sent, emails_failed, total_response_time_ms)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (provider_id, date) DO UPDATE
             SET emails_sent = email_provider_usage_logs.emails_sent + EXCLUDED.emails_sent,
                 emails_failed = email_provider_usage_logs.emails_failed + EXCLUDED.emails_failed,
                 total_response_time_ms =
                     email_provider_usage_logs.total_response_time_ms + EXCLUDED.total_response_time_ms",
        )
        .bind(provider_id.as_uuid())
        .bind(date)
        .bind(sent as i32)
        .bind(failed as i32)
        .bind(elapsed_ms as i64)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn record_test_result(&self, result: ProviderTestResult) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO email_provider_test_results
                 (id, provider_id, test_type, status, message, response_time_ms, test_data, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(result.id)
        .bind(result.provider_id.as_uuid())
        .bind(result.test_type.as_str())
        .bind(result.status.as_str())
        .bind(&result.message)
        .bind(result.response_time_ms.map(|ms| ms as i64))
        .bind(&result.test_data)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn health_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderHealthLog>, PortError> {
        let rows = sqlx::query_as::<_, HealthLogRow>(
            "SELECT id, provider_id, status, response_time_ms, error_message, test_type, created_at
             FROM email_provider_health_logs
             WHERE ($1::uuid IS NULL OR provider_id = $1)
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(provider_id.map(|id| *id.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows
            .into_iter()
            .map(ProviderHealthLog::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn usage_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderUsageLog>, PortError> {
        let rows = sqlx::query_as::<_, UsageLogRow>(
            "SELECT provider_id, date, emails_sent, emails_failed, total_response_time_ms
             FROM email_provider_usage_logs
             WHERE ($1::uuid IS NULL OR provider_id = $1)
             ORDER BY date DESC LIMIT $2",
        )
        .bind(provider_id.map(|id| *id.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows
            .into_iter()
            .map(ProviderUsageLog::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn test_results(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderTestResult>, PortError> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            "SELECT id, provider_id, test_type, status, message, response_time_ms, test_data, created_at
             FROM email_provider_test_results
             WHERE ($1::uuid IS NULL OR provider_id = $1)
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(provider_id.map(|id| *id.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rows
            .into_iter()
            .map(ProviderTestResult::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
