//! Provider persistence port

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{AdapterHealth, DomainPort, PortError, ProviderId};

use crate::logs::{ProviderHealthLog, ProviderTestResult, ProviderUsageLog};
use crate::provider::{BlockReason, EmailProviderConfig};

/// Outcome of [`ProviderStore::reserve_send`]
#[derive(Debug, Clone)]
pub enum Reservation {
    /// A slot was taken; the provider as it stands after the reservation
    Reserved(EmailProviderConfig),
    Blocked(BlockReason),
}

/// Storage for provider configuration, state and logs
///
/// Soft-deleted providers are never returned.
#[async_trait]
pub trait ProviderStore: DomainPort {
    /// All providers, active first then by priority and name
    async fn list_providers(&self) -> Result<Vec<EmailProviderConfig>, PortError>;

    /// Active providers in delivery order
    async fn list_active(&self) -> Result<Vec<EmailProviderConfig>, PortError>;

    async fn get_provider(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError>;

    async fn create_provider(
        &self,
        provider: EmailProviderConfig,
    ) -> Result<EmailProviderConfig, PortError>;

    /// Replaces configuration fields
    async fn update_provider(
        &self,
        provider: EmailProviderConfig,
    ) -> Result<EmailProviderConfig, PortError>;

    /// Rolls the usage windows, checks the limits and claims one send
    ///
    /// Runs atomically per provider: of two concurrent callers competing for
    /// the last slot, one gets [`Reservation::Blocked`].
    async fn reserve_send(&self, id: ProviderId, now: DateTime<Utc>) -> Result<Reservation, PortError>;

    /// Records the outcome of a reserved send; a failure releases the slot
    async fn complete_send(
        &self,
        id: ProviderId,
        success: bool,
        elapsed_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<(), PortError>;

    /// Records a send made without a reservation, such as a provider test
    async fn record_attempt(
        &self,
        id: ProviderId,
        success: bool,
        elapsed_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<(), PortError>;

    /// Applies a health observation and returns the updated provider
    async fn update_health(
        &self,
        id: ProviderId,
        status: AdapterHealth,
        error: Option<String>,
    ) -> Result<EmailProviderConfig, PortError>;

    /// Makes one provider the default and clears the flag on all others
    async fn set_default(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError>;

    async fn delete_provider(&self, id: ProviderId) -> Result<(), PortError>;

    async fn record_health_log(&self, log: ProviderHealthLog) -> Result<(), PortError>;

    /// Adds one attempt to the daily usage row, creating it if needed
    async fn record_usage(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        success: bool,
        elapsed_ms: u64,
    ) -> Result<(), PortError>;

    async fn record_test_result(&self, result: ProviderTestResult) -> Result<(), PortError>;

    /// Newest first
    async fn health_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderHealthLog>, PortError>;

    /// Newest date first
    async fn usage_logs(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderUsageLog>, PortError>;

    /// Newest first
    async fn test_results(
        &self,
        provider_id: Option<ProviderId>,
        limit: u32,
    ) -> Result<Vec<ProviderTestResult>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{HealthCheckResult, HealthCheckable};

    use crate::provider::sort_for_delivery;

    /// In-memory provider store
    #[derive(Debug, Default)]
    pub struct InMemoryProviderStore {
        providers: Arc<RwLock<HashMap<ProviderId, EmailProviderConfig>>>,
        health_logs: Arc<RwLock<Vec<ProviderHealthLog>>>,
        usage: Arc<RwLock<HashMap<(ProviderId, NaiveDate), ProviderUsageLog>>>,
        test_results: Arc<RwLock<Vec<ProviderTestResult>>>,
    }

    impl InMemoryProviderStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with providers for testing
        pub async fn with_providers(providers: Vec<EmailProviderConfig>) -> Self {
            let store = Self::new();
            for provider in providers {
                store.providers.write().await.insert(provider.id, provider);
            }
            store
        }

        /// Applies `change` to a live provider under the write lock
        async fn mutate<T>(
            &self,
            id: ProviderId,
            change: impl FnOnce(&mut EmailProviderConfig) -> T,
        ) -> Result<(EmailProviderConfig, T), PortError> {
            let mut providers = self.providers.write().await;
            let provider = providers
                .get_mut(&id)
                .filter(|p| !p.is_deleted)
                .ok_or_else(|| PortError::not_found("EmailProvider", id))?;
            let output = change(provider);
            provider.updated_at = Utc::now();
            Ok((provider.clone(), output))
        }
    }

    impl DomainPort for InMemoryProviderStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryProviderStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::new(
                "mock-provider-store",
                AdapterHealth::Healthy,
                0,
                Some("Mock adapter always healthy".to_string()),
            )
        }
    }

    #[async_trait]
    impl ProviderStore for InMemoryProviderStore {
        async fn list_providers(&self) -> Result<Vec<EmailProviderConfig>, PortError> {
            let mut providers: Vec<_> = self
                .providers
                .read()
                .await
                .values()
                .filter(|p| !p.is_deleted)
                .cloned()
                .collect();
            sort_for_delivery(&mut providers);
            providers.sort_by_key(|p| !p.is_active);
            Ok(providers)
        }

        async fn list_active(&self) -> Result<Vec<EmailProviderConfig>, PortError> {
            let mut providers: Vec<_> = self
                .providers
                .read()
                .await
                .values()
                .filter(|p| p.is_active && !p.is_deleted)
                .cloned()
                .collect();
            sort_for_delivery(&mut providers);
            Ok(providers)
        }

        async fn get_provider(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError> {
            self.providers
                .read()
                .await
                .get(&id)
                .filter(|p| !p.is_deleted)
                .cloned()
                .ok_or_else(|| PortError::not_found("EmailProvider", id))
        }

        async fn create_provider(
            &self,
            provider: EmailProviderConfig,
        ) -> Result<EmailProviderConfig, PortError> {
            let mut providers = self.providers.write().await;
            if providers.values().any(|p| !p.is_deleted && p.name == provider.name) {
                return Err(PortError::conflict(format!(
                    "Provider name already exists: {}",
                    provider.name
                )));
            }
            if provider.is_default {
                for other in providers.values_mut() {
                    other.is_default = false;
                }
            }
            providers.insert(provider.id, provider.clone());
            Ok(provider)
        }

        async fn update_provider(
            &self,
            provider: EmailProviderConfig,
        ) -> Result<EmailProviderConfig, PortError> {
            let mut providers = self.providers.write().await;
            if !providers.get(&provider.id).is_some_and(|p| !p.is_deleted) {
                return Err(PortError::not_found("EmailProvider", provider.id));
            }
            if provider.is_default {
                for other in providers.values_mut() {
                    other.is_default = false;
                }
            }
            providers.insert(provider.id, provider.clone());
            Ok(provider)
        }

        async fn reserve_send(&self, id: ProviderId, now: DateTime<Utc>) -> Result<Reservation, PortError> {
            let (provider, reserved) = self.mutate(id, |p| p.reserve_slot(now)).await?;
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
            self.mutate(id, |p| p.complete_attempt(success, elapsed_ms, now)).await?;
            Ok(())
        }

        async fn record_attempt(
            &self,
            id: ProviderId,
            success: bool,
            elapsed_ms: u64,
            now: DateTime<Utc>,
        ) -> Result<(), PortError> {
            self.mutate(id, |p| p.record_attempt(success, elapsed_ms, now)).await?;
            Ok(())
        }

        async fn update_health(
            &self,
            id: ProviderId,
            status: AdapterHealth,
            error: Option<String>,
        ) -> Result<EmailProviderConfig, PortError> {
            Ok(self.mutate(id, |p| p.update_health(status, error)).await?.0)
        }

        async fn set_default(&self, id: ProviderId) -> Result<EmailProviderConfig, PortError> {
            let mut providers = self.providers.write().await;
            if !providers.get(&id).is_some_and(|p| !p.is_deleted) {
                return Err(PortError::not_found("EmailProvider", id));
            }
            for (other_id, provider) in providers.iter_mut() {
                provider.is_default = *other_id == id;
            }
            providers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("EmailProvider", id))
        }

        async fn delete_provider(&self, id: ProviderId) -> Result<(), PortError> {
            let mut providers = self.providers.write().await;
            match providers.get_mut(&id).filter(|p| !p.is_deleted) {
                Some(provider) => {
                    provider.soft_delete();
                    Ok(())
                }
                None => Err(PortError::not_found("EmailProvider", id)),
            }
        }

        async fn record_health_log(&self, log: ProviderHealthLog) -> Result<(), PortError> {
            self.health_logs.write().await.push(log);
            Ok(())
        }

        async fn record_usage(
            &self,
            provider_id: ProviderId,
            date: NaiveDate,
            success: bool,
            elapsed_ms: u64,
        ) -> Result<(), PortError> {
            self.usage
                .write()
                .await
                .entry((provider_id, date))
                .or_insert_with(|| ProviderUsageLog::empty(provider_id, date))
                .add(success, elapsed_ms);
            Ok(())
        }

        async fn record_test_result(&self, result: ProviderTestResult) -> Result<(), PortError> {
            self.test_results.write().await.push(result);
            Ok(())
        }

        async fn health_logs(
            &self,
            provider_id: Option<ProviderId>,
            limit: u32,
        ) -> Result<Vec<ProviderHealthLog>, PortError> {
            let logs = self.health_logs.read().await;
            Ok(logs
                .iter()
                .rev()
                .filter(|l| provider_id.map_or(true, |id| l.provider_id == id))
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn usage_logs(
            &self,
            provider_id: Option<ProviderId>,
            limit: u32,
        ) -> Result<Vec<ProviderUsageLog>, PortError> {
            let mut rows: Vec<_> = self
                .usage
                .read()
                .await
                .values()
                .filter(|u| provider_id.map_or(true, |id| u.provider_id == id))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.date.cmp(&a.date));
            rows.truncate(limit as usize);
            Ok(rows)
        }

        async fn test_results(
            &self,
            provider_id: Option<ProviderId>,
            limit: u32,
        ) -> Result<Vec<ProviderTestResult>, PortError> {
            let results = self.test_results.read().await;
            Ok(results
                .iter()
                .rev()
                .filter(|r| provider_id.map_or(true, |id| r.provider_id == id))
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }
}
