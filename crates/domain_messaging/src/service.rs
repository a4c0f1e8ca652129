//! Failover delivery, health checks and provider tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AdapterHealth, HealthCheckResult, ProviderId};

use crate::error::MessagingError;
use crate::logs::{
    HealthTestType, ProviderHealthLog, ProviderTestResult, ProviderUsageLog, TestStatus, TestType,
};
use crate::message::OutgoingEmail;
use crate::provider::{EmailProviderConfig, ProviderSecrets, ProviderType};
use crate::store::{ProviderStore, Reservation};
use crate::transport::{EmailTransport, TransportFactory};
use crate::vault::{CredentialCache, CredentialVault, ProviderCredentials, DEFAULT_CREDENTIAL_TTL};

/// Result of a delivered message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub message_id: String,
    pub elapsed_ms: u64,
    /// Providers tried, in order, including the one that succeeded
    pub attempted: Vec<String>,
}

/// Per-provider delivery statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatistics {
    pub provider_id: ProviderId,
    pub name: String,
    pub provider_type: ProviderType,
    pub is_active: bool,
    pub is_default: bool,
    pub health_status: AdapterHealth,
    pub last_health_check: Option<DateTime<Utc>>,
    pub emails_sent_today: u32,
    pub daily_limit: u32,
    pub daily_remaining: u32,
    pub emails_sent_this_month: u32,
    pub monthly_limit: u32,
    pub total_emails_sent: u64,
    pub total_emails_failed: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

impl From<&EmailProviderConfig> for ProviderStatistics {
    fn from(p: &EmailProviderConfig) -> Self {
        let attempts = p.total_emails_sent + p.total_emails_failed;
        let success_rate = if attempts == 0 {
            0.0
        } else {
            p.total_emails_sent as f64 / attempts as f64 * 100.0
        };
        Self {
            provider_id: p.id,
            name: p.name.clone(),
            provider_type: p.provider_type,
            is_active: p.is_active,
            is_default: p.is_default,
            health_status: p.health_status,
            last_health_check: p.last_health_check,
            emails_sent_today: p.emails_sent_today,
            daily_limit: p.daily_limit,
            daily_remaining: p.daily_limit.saturating_sub(p.emails_sent_today),
            emails_sent_this_month: p.emails_sent_this_month,
            monthly_limit: p.monthly_limit,
            total_emails_sent: p.total_emails_sent,
            total_emails_failed: p.total_emails_failed,
            success_rate: (success_rate * 100.0).round() / 100.0,
            average_response_time_ms: p.average_response_time_ms,
        }
    }
}

/// Sends email through the configured providers with failover
pub struct EmailProviderService {
    store: Arc<dyn ProviderStore>,
    vault: Arc<CredentialVault>,
    transports: Arc<dyn TransportFactory>,
    cache: CredentialCache,
}

impl EmailProviderService {
    pub fn new(
        store: Arc<dyn ProviderStore>,
        vault: Arc<CredentialVault>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            store,
            vault,
            transports,
            cache: CredentialCache::new(DEFAULT_CREDENTIAL_TTL),
        }
    }

    pub fn with_credential_ttl(mut self, ttl: Duration) -> Self {
        self.cache = CredentialCache::new(ttl);
        self
    }

    // ------------------------------------------------------------------
    // Provider management
    // ------------------------------------------------------------------

    pub async fn list_providers(&self) -> Result<Vec<EmailProviderConfig>, MessagingError> {
        Ok(self.store.list_providers().await?)
    }

    pub async fn get_provider(&self, id: ProviderId) -> Result<EmailProviderConfig, MessagingError> {
        self.store.get_provider(id).await.map_err(|e| {
            if e.is_not_found() {
                MessagingError::ProviderNotFound(id.to_string())
            } else {
                MessagingError::Store(e)
            }
        })
    }

    /// Stores a new provider, encrypting the plaintext `secrets`
    pub async fn create_provider(
        &self,
        mut provider: EmailProviderConfig,
        secrets: &ProviderSecrets,
    ) -> Result<EmailProviderConfig, MessagingError> {
        provider.secrets = self.vault.seal(secrets)?;
        let created = self.store.create_provider(provider).await?;
        info!(provider_id = %created.id, name = %created.name, "Email provider created");
        Ok(created)
    }

    /// Updates configuration; non-empty plaintext secrets replace stored ones
    pub async fn update_provider(
        &self,
        mut provider: EmailProviderConfig,
        secrets: Option<&ProviderSecrets>,
    ) -> Result<EmailProviderConfig, MessagingError> {
        if let Some(plain) = secrets {
            let sealed = self.vault.seal(plain)?;
            let s = &mut provider.secrets;
            for (current, new) in [
                (&mut s.api_key, sealed.api_key),
                (&mut s.api_secret, sealed.api_secret),
                (&mut s.access_key_id, sealed.access_key_id),
                (&mut s.secret_access_key, sealed.secret_access_key),
                (&mut s.smtp_password, sealed.smtp_password),
            ] {
                if !new.is_empty() {
                    *current = new;
                }
            }
        }
        provider.updated_at = Utc::now();
        let updated = self.store.update_provider(provider).await?;
        self.cache.invalidate(updated.id).await;
        Ok(updated)
    }

    pub async fn set_default(&self, id: ProviderId) -> Result<EmailProviderConfig, MessagingError> {
        let provider = self.store.set_default(id).await?;
        info!(provider_id = %id, name = %provider.name, "Default email provider changed");
        Ok(provider)
    }

    pub async fn delete_provider(&self, id: ProviderId) -> Result<(), MessagingError> {
        self.store.delete_provider(id).await?;
        self.cache.invalidate(id).await;
        info!(provider_id = %id, "Email provider deleted");
        Ok(())
    }

    pub async fn invalidate_credentials(&self, id: ProviderId) {
        self.cache.invalidate(id).await;
    }

    pub async fn health_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderHealthLog>, MessagingError> {
        Ok(self.store.health_logs(provider_id, limit).await?)
    }

    pub async fn usage_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderUsageLog>, MessagingError> {
        Ok(self.store.usage_logs(provider_id, limit).await?)
    }

    pub async fn test_results(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderTestResult>, MessagingError> {
        Ok(self.store.test_results(provider_id, limit).await?)
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Sends through the first provider that accepts the message
    ///
    /// Providers are walked in priority order. A send slot is reserved in the
    /// store before the transport is called, so concurrent sends cannot push
    /// a provider past its limits. One that is refused is skipped; one whose
    /// transport fails is marked unhealthy and the next is tried.
    #[instrument(skip(self, email), fields(recipients = email.to.len()))]
    pub async fn send_email(&self, email: &OutgoingEmail) -> Result<SendOutcome, MessagingError> {
        email.validate()?;

        let providers = self.store.list_active().await?;
        if providers.is_empty() {
            return Err(MessagingError::ProviderNotFound(
                "no active email provider configured".into(),
            ));
        }

        let mut attempted = Vec::new();
        for mut provider in providers {
            let now = Utc::now();
            provider.roll_usage_windows(now.date_naive());
            if let Err(reason) = provider.can_send(now) {
                debug!(provider = %provider.name, %reason, "Skipping email provider");
                continue;
            }

            let credentials = self.credentials(&provider).await;
            let transport = match self.transports.build(&provider, credentials.clone()) {
                Ok(transport) => transport,
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, "Email provider misconfigured");
                    attempted.push(provider.name.clone());
                    self.record_health(&mut provider, AdapterHealth::Unhealthy, Some(e.to_string()))
                        .await;
                    continue;
                }
            };

            match self.store.reserve_send(provider.id, now).await {
                Ok(Reservation::Reserved(_)) => {}
                Ok(Reservation::Blocked(reason)) => {
                    debug!(provider = %provider.name, %reason, "Email provider refused the reservation");
                    continue;
                }
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, "Failed to reserve a send slot");
                    continue;
                }
            }

            attempted.push(provider.name.clone());
            let message = with_sender_defaults(email, &credentials);
            let started = Instant::now();
            let result = transport.send(&message).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if let Err(e) = self
                .store
                .complete_send(provider.id, result.is_ok(), elapsed_ms, Utc::now())
                .await
            {
                warn!(provider = %provider.name, error = %e, "Failed to complete provider usage");
            }
            self.record_usage(&provider, result.is_ok(), elapsed_ms).await;

            match result {
                Ok(receipt) => {
                    self.record_health(&mut provider, AdapterHealth::Healthy, None).await;
                    info!(
                        provider = %provider.name,
                        message_id = %receipt.message_id,
                        elapsed_ms,
                        "Email sent"
                    );
                    return Ok(SendOutcome {
                        provider_id: provider.id,
                        provider_name: provider.name,
                        message_id: receipt.message_id,
                        elapsed_ms,
                        attempted,
                    });
                }
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, elapsed_ms, "Email provider failed, trying next");
                    self.record_health(&mut provider, AdapterHealth::Unhealthy, Some(e.to_string()))
                        .await;
                }
            }
        }

        warn!(attempted = ?attempted, "All email providers failed");
        Err(MessagingError::AllProvidersFailed { attempted })
    }

    /// First provider that would currently accept a message
    pub async fn available_provider(&self) -> Result<Option<EmailProviderConfig>, MessagingError> {
        let now = Utc::now();
        Ok(self
            .store
            .list_active()
            .await?
            .into_iter()
            .map(|mut p| {
                p.roll_usage_windows(now.date_naive());
                p
            })
            .find(|p| p.can_send(now).is_ok()))
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Probes one provider, updating its health and writing a health log
    pub async fn check_provider_health(&self, id: ProviderId) -> Result<HealthCheckResult, MessagingError> {
        let mut provider = self.get_provider(id).await?;
        Ok(self.probe(&mut provider).await)
    }

    /// Probes every active provider
    pub async fn health_check_all(&self) -> Result<Vec<HealthCheckResult>, MessagingError> {
        let mut results = Vec::new();
        for mut provider in self.store.list_active().await? {
            results.push(self.probe(&mut provider).await);
        }
        let healthy = results.iter().filter(|r| r.is_healthy()).count();
        info!(checked = results.len(), healthy, "Email provider health check complete");
        Ok(results)
    }

    async fn probe(&self, provider: &mut EmailProviderConfig) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = match self.transport_for(provider).await {
            Ok(transport) => transport.health_check().await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let (status, error) = match outcome {
            Ok(()) => (AdapterHealth::Healthy, None),
            Err(e) => {
                warn!(provider = %provider.name, error = %e, "Email provider health check failed");
                (AdapterHealth::Unhealthy, Some(e))
            }
        };

        self.record_health(provider, status, error.clone()).await;

        let test_type = match provider.provider_type {
            ProviderType::Sendgrid => HealthTestType::ApiTest,
            ProviderType::AwsSes | ProviderType::Smtp => HealthTestType::Connection,
        };
        let log = ProviderHealthLog::new(provider.id, status, latency_ms, error.clone(), test_type);
        if let Err(e) = self.store.record_health_log(log).await {
            warn!(provider = %provider.name, error = %e, "Failed to write health log");
        }

        HealthCheckResult::new(provider.id.to_string(), status, latency_ms, error)
    }

    // ------------------------------------------------------------------
    // Provider tests
    // ------------------------------------------------------------------

    /// Tests one provider and records the result
    ///
    /// With a recipient a test message is sent through this provider only;
    /// without one the transport's connection check runs.
    pub async fn test_provider(
        &self,
        id: ProviderId,
        test_email: Option<&str>,
    ) -> Result<ProviderTestResult, MessagingError> {
        let mut provider = self.get_provider(id).await?;

        let result = match test_email {
            Some(recipient) => self.send_test(&mut provider, recipient).await?,
            None => self.connection_test(&mut provider).await,
        };

        self.store.record_test_result(result.clone()).await?;
        info!(
            provider = %provider.name,
            test_type = %result.test_type,
            status = %result.status,
            "Email provider tested"
        );
        Ok(result)
    }

    async fn send_test(
        &self,
        provider: &mut EmailProviderConfig,
        recipient: &str,
    ) -> Result<ProviderTestResult, MessagingError> {
        let email = OutgoingEmail::new(recipient, format!("Test Email from {}", provider.name))
            .html(format!(
                "<h2>Email Provider Test</h2><p>This is a test message sent through <strong>{}</strong> ({}).</p>",
                provider.name, provider.provider_type
            ))
            .text(format!(
                "Email Provider Test\n\nThis is a test message sent through {} ({}).",
                provider.name, provider.provider_type
            ));
        email.validate()?;

        let credentials = self.credentials(provider).await;
        let transport = match self.transports.build(provider, credentials.clone()) {
            Ok(transport) => transport,
            Err(e) => {
                return Ok(ProviderTestResult::new(provider.id, TestType::SendTest, TestStatus::Failed, e.to_string())
                    .with_data(json!({ "recipient": recipient })));
            }
        };

        let message = with_sender_defaults(&email, &credentials);
        let started = Instant::now();
        let result = transport.send(&message).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self
            .store
            .record_attempt(provider.id, result.is_ok(), elapsed_ms, Utc::now())
            .await
        {
            warn!(provider = %provider.name, error = %e, "Failed to record provider usage");
        }
        self.record_usage(provider, result.is_ok(), elapsed_ms).await;

        let test = match result {
            Ok(receipt) => {
                self.record_health(provider, AdapterHealth::Healthy, None).await;
                ProviderTestResult::new(provider.id, TestType::SendTest, TestStatus::Success, "Test email sent successfully")
                    .with_timing(elapsed_ms)
                    .with_data(json!({ "recipient": recipient, "message_id": receipt.message_id }))
            }
            Err(e) => {
                self.record_health(provider, AdapterHealth::Unhealthy, Some(e.to_string()))
                    .await;
                ProviderTestResult::new(provider.id, TestType::SendTest, TestStatus::Failed, e.to_string())
                    .with_timing(elapsed_ms)
                    .with_data(json!({ "recipient": recipient }))
            }
        };
        Ok(test)
    }

    async fn connection_test(&self, provider: &mut EmailProviderConfig) -> ProviderTestResult {
        let test_type = match provider.provider_type {
            ProviderType::Sendgrid => TestType::ApiValidation,
            ProviderType::AwsSes => TestType::Authentication,
            ProviderType::Smtp => TestType::Connection,
        };
        let health = self.probe(provider).await;
        let (status, message) = match &health.message {
            None => (TestStatus::Success, "Connection test passed".to_string()),
            Some(error) => (TestStatus::Failed, error.clone()),
        };
        ProviderTestResult::new(provider.id, test_type, status, message).with_timing(health.latency_ms)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub async fn statistics(&self) -> Result<Vec<ProviderStatistics>, MessagingError> {
        let today = Utc::now().date_naive();
        Ok(self
            .store
            .list_providers()
            .await?
            .into_iter()
            .map(|mut p| {
                p.roll_usage_windows(today);
                ProviderStatistics::from(&p)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn credentials(&self, provider: &EmailProviderConfig) -> ProviderCredentials {
        if let Some(cached) = self.cache.get(provider.id).await {
            return cached;
        }
        let credentials = self.vault.credentials_for(provider);
        self.cache.put(provider.id, credentials.clone()).await;
        credentials
    }

    async fn transport_for(
        &self,
        provider: &EmailProviderConfig,
    ) -> Result<Box<dyn EmailTransport>, MessagingError> {
        let credentials = self.credentials(provider).await;
        self.transports.build(provider, credentials)
    }

    /// Bookkeeping writes never fail a delivery
    async fn record_health(
        &self,
        provider: &mut EmailProviderConfig,
        status: AdapterHealth,
        error: Option<String>,
    ) {
        match self.store.update_health(provider.id, status, error.clone()).await {
            Ok(updated) => *provider = updated,
            Err(e) => {
                warn!(provider = %provider.name, error = %e, "Failed to persist provider health");
                provider.update_health(status, error);
            }
        }
    }

    async fn record_usage(&self, provider: &EmailProviderConfig, success: bool, elapsed_ms: u64) {
        if let Err(e) = self
            .store
            .record_usage(provider.id, Utc::now().date_naive(), success, elapsed_ms)
            .await
        {
            warn!(provider = %provider.name, error = %e, "Failed to record provider usage");
        }
    }
}

/// Fills sender fields the message leaves unset from the provider
fn with_sender_defaults(email: &OutgoingEmail, credentials: &ProviderCredentials) -> OutgoingEmail {
    let mut message = email.clone();
    if message.from_email.as_deref().map_or(true, str::is_empty) {
        message.from_email = Some(credentials.from_email.clone());
    }
    if message.from_name.is_none() {
        message.from_name = credentials.from_name.clone();
    }
    if message.reply_to.is_none() {
        message.reply_to = credentials.reply_to.clone();
    }
    message
}
