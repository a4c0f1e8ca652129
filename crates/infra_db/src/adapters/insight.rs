//! PostgreSQL insight adapters
//!
//! [`PostgresInsightSource`] gathers a customer's records from the
//! repositories; [`PostgresInsightStore`] keeps calculated sections in
//! `customer_insights`, one row per customer and insight type.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InsightId, PortError,
};
use domain_customer::Customer;
use domain_insights::{CustomerCounts, CustomerRecords, InsightRecord, InsightSource, InsightStore, InsightType};

use crate::error::{parse_column, DatabaseError};
use crate::repositories::{
    ClaimRepository, CommunicationRepository, CustomerRepository, PaymentRepository, PolicyRepository,
    RenewalRepository,
};

async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = Instant::now();
    let result = sqlx::query("SELECT 1").execute(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => HealthCheckResult::new(adapter_id, AdapterHealth::Healthy, latency_ms, None),
        Err(e) => HealthCheckResult::new(
            adapter_id,
            AdapterHealth::Unhealthy,
            latency_ms,
            Some(format!("Database health check failed: {}", e)),
        ),
    }
}

/// Reads insight inputs through the entity repositories
#[derive(Debug, Clone)]
pub struct PostgresInsightSource {
    pool: PgPool,
    customers: CustomerRepository,
    policies: PolicyRepository,
    payments: PaymentRepository,
    communications: CommunicationRepository,
    claims: ClaimRepository,
    renewals: RenewalRepository,
}

impl PostgresInsightSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            customers: CustomerRepository::new(pool.clone()),
            policies: PolicyRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            communications: CommunicationRepository::new(pool.clone()),
            claims: ClaimRepository::new(pool.clone()),
            renewals: RenewalRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresInsightSource {}

#[async_trait]
impl HealthCheckable for PostgresInsightSource {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-insight-source").await
    }
}

#[async_trait]
impl InsightSource for PostgresInsightSource {
    #[instrument(skip(self), fields(%customer_id))]
    async fn load_customer(&self, customer_id: CustomerId) -> Result<CustomerRecords, PortError> {
        let customer = self.customers.get(customer_id).await?;
        let policies = self.policies.for_customer(customer_id).await?;
        let policy_type_names = self
            .policies
            .list_types(false)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect::<HashMap<_, _>>();

        Ok(CustomerRecords {
            customer,
            policies,
            policy_type_names,
            payments: self.payments.for_customer(customer_id).await?,
            communications: self.communications.for_customer(customer_id).await?,
            claims: self.claims.for_customer(customer_id).await?,
            cases: self.renewals.for_customer(customer_id).await?,
            installments: self.renewals.customer_installments(customer_id).await?,
        })
    }

    async fn customers(&self, ids: &[CustomerId]) -> Result<Vec<Customer>, PortError> {
        Ok(self.customers.find_many(ids).await?)
    }

    async fn customer_counts(&self) -> Result<CustomerCounts, PortError> {
        let (total_customers, hni_customers, customers_with_claims) = self.customers.counts().await?;
        Ok(CustomerCounts {
            total_customers,
            hni_customers,
            customers_with_claims,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct InsightRow {
    id: Uuid,
    customer_id: Uuid,
    insight_type: String,
    data: serde_json::Value,
    calculated_at: DateTime<Utc>,
}

impl TryFrom<InsightRow> for InsightRecord {
    type Error = DatabaseError;

    fn try_from(row: InsightRow) -> Result<Self, Self::Error> {
        Ok(InsightRecord {
            id: InsightId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            insight_type: parse_column("insight_type", &row.insight_type)?,
            data: row.data,
            calculated_at: row.calculated_at,
        })
    }
}

const INSIGHT_COLUMNS: &str = "id, customer_id, insight_type, data, calculated_at";

/// Cached insight sections in `customer_insights`
#[derive(Debug, Clone)]
pub struct PostgresInsightStore {
    pool: PgPool,
}

impl PostgresInsightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, customer_id: Option<CustomerId>) -> Result<Vec<InsightRecord>, DatabaseError> {
        sqlx::query_as::<_, InsightRow>(&format!(
            "SELECT {} FROM customer_insights
             WHERE ($1::uuid IS NULL OR customer_id = $1)
             ORDER BY customer_id, insight_type",
            INSIGHT_COLUMNS
        ))
        .bind(customer_id.map(|id| *id.as_uuid()))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(InsightRecord::try_from)
        .collect()
    }
}

impl DomainPort for PostgresInsightStore {}

#[async_trait]
impl HealthCheckable for PostgresInsightStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-insight-store").await
    }
}

#[async_trait]
impl InsightStore for PostgresInsightStore {
    async fn get(
        &self,
        customer_id: CustomerId,
        insight_type: InsightType,
    ) -> Result<Option<InsightRecord>, PortError> {
        let row = sqlx::query_as::<_, InsightRow>(&format!(
            "SELECT {} FROM customer_insights WHERE customer_id = $1 AND insight_type = $2",
            INSIGHT_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .bind(insight_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(InsightRecord::try_from).transpose()?)
    }

    /// The row keeps its original id when replaced
    async fn upsert(&self, record: InsightRecord) -> Result<InsightRecord, PortError> {
        let row = sqlx::query_as::<_, InsightRow>(&format!(
            "INSERT INTO customer_insights ({})
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (customer_id, insight_type) DO UPDATE
             SET data = EXCLUDED.data, calculated_at = EXCLUDED.calculated_at
             RETURNING {}",
            INSIGHT_COLUMNS, INSIGHT_COLUMNS
        ))
        .bind(record.id.as_uuid())
        .bind(record.customer_id.as_uuid())
        .bind(record.insight_type.as_str())
        .bind(&record.data)
        .bind(record.calculated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.try_into()?)
    }

    async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<InsightRecord>, PortError> {
        Ok(self.fetch(Some(customer_id)).await?)
    }

    async fn all(&self) -> Result<Vec<InsightRecord>, PortError> {
        Ok(self.fetch(None).await?)
    }
}
