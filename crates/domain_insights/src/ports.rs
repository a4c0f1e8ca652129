//! Insight ports
//!
//! [`InsightSource`] reads the customer records the calculators run over;
//! [`InsightStore`] keeps computed sections.

use async_trait::async_trait;

use core_kernel::{CustomerId, DomainPort, PortError};
use domain_customer::Customer;

use crate::cache::{InsightRecord, InsightType};
use crate::records::CustomerRecords;
use crate::summary::CustomerCounts;

#[async_trait]
pub trait InsightSource: DomainPort {
    /// Loads every non-deleted record of a customer; NotFound if the customer
    /// is missing or deleted
    async fn load_customer(&self, customer_id: CustomerId) -> Result<CustomerRecords, PortError>;

    /// Non-deleted customers among `ids`, in no particular order
    async fn customers(&self, ids: &[CustomerId]) -> Result<Vec<Customer>, PortError>;

    async fn customer_counts(&self) -> Result<CustomerCounts, PortError>;
}

#[async_trait]
pub trait InsightStore: DomainPort {
    async fn get(
        &self,
        customer_id: CustomerId,
        insight_type: InsightType,
    ) -> Result<Option<InsightRecord>, PortError>;

    /// Inserts or replaces the record for its customer and type
    async fn upsert(&self, record: InsightRecord) -> Result<InsightRecord, PortError>;

    async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<InsightRecord>, PortError>;

    /// Every cached record
    async fn all(&self) -> Result<Vec<InsightRecord>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable};
    use domain_customer::CustomerProfile;

    /// In-memory source over pre-built record bundles
    #[derive(Debug, Default)]
    pub struct InMemoryInsightSource {
        records: Arc<RwLock<HashMap<CustomerId, CustomerRecords>>>,
    }

    impl InMemoryInsightSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, records: CustomerRecords) {
            self.records.write().await.insert(records.customer.id, records);
        }
    }

    impl DomainPort for InMemoryInsightSource {}

    #[async_trait]
    impl HealthCheckable for InMemoryInsightSource {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::new(
                "mock-insight-source",
                AdapterHealth::Healthy,
                0,
                Some("Mock adapter always healthy".to_string()),
            )
        }
    }

    #[async_trait]
    impl InsightSource for InMemoryInsightSource {
        async fn load_customer(&self, customer_id: CustomerId) -> Result<CustomerRecords, PortError> {
            self.records
                .read()
                .await
                .get(&customer_id)
                .filter(|r| !r.customer.is_deleted)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", customer_id))
        }

        async fn customers(&self, ids: &[CustomerId]) -> Result<Vec<Customer>, PortError> {
            let records = self.records.read().await;
            Ok(ids
                .iter()
                .filter_map(|id| records.get(id))
                .filter(|r| !r.customer.is_deleted)
                .map(|r| r.customer.clone())
                .collect())
        }

        async fn customer_counts(&self) -> Result<CustomerCounts, PortError> {
            let records = self.records.read().await;
            let live: Vec<_> = records.values().filter(|r| !r.customer.is_deleted).collect();
            Ok(CustomerCounts {
                total_customers: live.len() as u64,
                hni_customers: live
                    .iter()
                    .filter(|r| r.customer.profile == CustomerProfile::Hni)
                    .count() as u64,
                customers_with_claims: live.iter().filter(|r| !r.claims.is_empty()).count() as u64,
            })
        }
    }

    /// In-memory insight cache
    #[derive(Debug, Default)]
    pub struct InMemoryInsightStore {
        records: Arc<RwLock<HashMap<(CustomerId, InsightType), InsightRecord>>>,
    }

    impl InMemoryInsightStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for InMemoryInsightStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryInsightStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::new(
                "mock-insight-store",
                AdapterHealth::Healthy,
                0,
                Some("Mock adapter always healthy".to_string()),
            )
        }
    }

    #[async_trait]
    impl InsightStore for InMemoryInsightStore {
        async fn get(
            &self,
            customer_id: CustomerId,
            insight_type: InsightType,
        ) -> Result<Option<InsightRecord>, PortError> {
            Ok(self.records.read().await.get(&(customer_id, insight_type)).cloned())
        }

        async fn upsert(&self, mut record: InsightRecord) -> Result<InsightRecord, PortError> {
            let mut records = self.records.write().await;
            let key = (record.customer_id, record.insight_type);
            if let Some(existing) = records.get(&key) {
                record.id = existing.id;
            }
            records.insert(key, record.clone());
            Ok(record)
        }

        async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<InsightRecord>, PortError> {
            let mut found: Vec<_> = self
                .records
                .read()
                .await
                .values()
                .filter(|r| r.customer_id == customer_id)
                .cloned()
                .collect();
            found.sort_by_key(|r| r.insight_type);
            Ok(found)
        }

        async fn all(&self) -> Result<Vec<InsightRecord>, PortError> {
            Ok(self.records.read().await.values().cloned().collect())
        }
    }
}
