//! Insight loading, calculation and caching

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{CustomerId, Page, PageRequest};
use domain_customer::{CustomerPriority, CustomerProfile, CustomerStatus};

use crate::cache::{InsightRecord, InsightType, DEFAULT_INSIGHT_TTL_SECS};
use crate::claims::ClaimsInsights;
use crate::communication::CommunicationInsights;
use crate::error::InsightError;
use crate::history::{
    ClaimsHistory, CommunicationHistory, PaymentHistory, PaymentSchedule, DEFAULT_HISTORY_YEARS,
};
use crate::payment::PaymentInsights;
use crate::ports::{InsightSource, InsightStore};
use crate::profile::ProfileInsights;
use crate::records::CustomerRecords;
use crate::summary::{CustomerInsightSummary, InsightFilter, InsightsDashboard};

/// Most customers one bulk recalculation accepts
pub const MAX_BULK_CUSTOMERS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub id: CustomerId,
    pub customer_code: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub priority: CustomerPriority,
    pub profile: CustomerProfile,
    pub customer_since: Option<NaiveDate>,
    pub total_policies: u32,
    pub total_premium: Decimal,
}

impl From<&CustomerRecords> for CustomerInfo {
    fn from(records: &CustomerRecords) -> Self {
        let c = &records.customer;
        Self {
            id: c.id,
            customer_code: c.customer_code.clone(),
            full_name: c.full_name(),
            email: c.email.clone(),
            phone: c.phone.clone(),
            status: c.status,
            priority: c.priority,
            profile: c.profile,
            customer_since: c.first_policy_date,
            total_policies: c.total_policies,
            total_premium: c.total_premium,
        }
    }
}

/// Every section for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInsights {
    pub customer_info: CustomerInfo,
    pub payment_insights: PaymentInsights,
    pub communication_insights: CommunicationInsights,
    pub claims_insights: ClaimsInsights,
    pub profile_insights: ProfileInsights,
    pub payment_schedule: PaymentSchedule,
    pub payment_history: PaymentHistory,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub customer_id: CustomerId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRecalculation {
    pub total_requested: u32,
    pub updated_count: u32,
    pub failed: Vec<BulkFailure>,
}

/// Cached sections grouped per customer
#[derive(Default)]
struct CachedSections {
    payment: Option<PaymentInsights>,
    communication: Option<CommunicationInsights>,
    claims: Option<ClaimsInsights>,
    profile: Option<ProfileInsights>,
    oldest: Option<DateTime<Utc>>,
}

pub struct InsightsService {
    source: Arc<dyn InsightSource>,
    store: Arc<dyn InsightStore>,
    ttl: Duration,
}

impl InsightsService {
    pub fn new(source: Arc<dyn InsightSource>, store: Arc<dyn InsightStore>) -> Self {
        Self {
            source,
            store,
            ttl: Duration::seconds(DEFAULT_INSIGHT_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    // ------------------------------------------------------------------
    // Per-customer sections
    // ------------------------------------------------------------------

    /// All sections; cached sections younger than the TTL are reused unless
    /// `force_refresh` is set
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn customer_insights(
        &self,
        customer_id: CustomerId,
        force_refresh: bool,
    ) -> Result<CustomerInsights, InsightError> {
        let now = Utc::now();
        let today = now.date_naive();
        let records = self.load(customer_id).await?;

        let payment_insights = self
            .section(&records, InsightType::Payment, force_refresh, now, |r| {
                PaymentInsights::compute(&r.payments, today)
            })
            .await?;
        let communication_insights = self
            .section(&records, InsightType::Communication, force_refresh, now, |r| {
                CommunicationInsights::compute(&r.communications)
            })
            .await?;
        let claims_insights = self
            .section(&records, InsightType::Claims, force_refresh, now, |r| {
                ClaimsInsights::compute(&r.claims, today)
            })
            .await?;
        let profile_insights = self
            .section(&records, InsightType::Profile, force_refresh, now, |r| {
                ProfileInsights::compute(r, now)
            })
            .await?;

        if force_refresh {
            info!(%customer_id, "Customer insights recalculated");
        }

        Ok(CustomerInsights {
            customer_info: CustomerInfo::from(&records),
            payment_insights,
            communication_insights,
            claims_insights,
            profile_insights,
            payment_schedule: PaymentSchedule::compute(&records, today),
            payment_history: PaymentHistory::compute(&records, today, DEFAULT_HISTORY_YEARS),
            calculated_at: now,
        })
    }

    pub async fn recalculate(&self, customer_id: CustomerId) -> Result<CustomerInsights, InsightError> {
        self.customer_insights(customer_id, true).await
    }

    pub async fn payment_insights(
        &self,
        customer_id: CustomerId,
        force_refresh: bool,
    ) -> Result<PaymentInsights, InsightError> {
        let now = Utc::now();
        self.single(customer_id, InsightType::Payment, force_refresh, now, |r| {
            PaymentInsights::compute(&r.payments, now.date_naive())
        })
        .await
    }

    pub async fn communication_insights(
        &self,
        customer_id: CustomerId,
        force_refresh: bool,
    ) -> Result<CommunicationInsights, InsightError> {
        self.single(customer_id, InsightType::Communication, force_refresh, Utc::now(), |r| {
            CommunicationInsights::compute(&r.communications)
        })
        .await
    }

    pub async fn claims_insights(
        &self,
        customer_id: CustomerId,
        force_refresh: bool,
    ) -> Result<ClaimsInsights, InsightError> {
        let now = Utc::now();
        self.single(customer_id, InsightType::Claims, force_refresh, now, |r| {
            ClaimsInsights::compute(&r.claims, now.date_naive())
        })
        .await
    }

    pub async fn profile_insights(
        &self,
        customer_id: CustomerId,
        force_refresh: bool,
    ) -> Result<ProfileInsights, InsightError> {
        let now = Utc::now();
        self.single(customer_id, InsightType::Profile, force_refresh, now, |r| {
            ProfileInsights::compute(r, now)
        })
        .await
    }

    pub async fn cached_records(&self, customer_id: CustomerId) -> Result<Vec<InsightRecord>, InsightError> {
        Ok(self.store.for_customer(customer_id).await?)
    }

    // ------------------------------------------------------------------
    // Histories (never cached)
    // ------------------------------------------------------------------

    pub async fn payment_schedule(&self, customer_id: CustomerId) -> Result<PaymentSchedule, InsightError> {
        let records = self.load(customer_id).await?;
        Ok(PaymentSchedule::compute(&records, Utc::now().date_naive()))
    }

    pub async fn payment_history(
        &self,
        customer_id: CustomerId,
        years: Option<u32>,
    ) -> Result<PaymentHistory, InsightError> {
        let years = years.unwrap_or(DEFAULT_HISTORY_YEARS);
        if years == 0 || years > 50 {
            return Err(InsightError::Validation(format!(
                "history span must be 1 to 50 years, got {}",
                years
            )));
        }
        let records = self.load(customer_id).await?;
        Ok(PaymentHistory::compute(&records, Utc::now().date_naive(), years))
    }

    pub async fn communication_history(
        &self,
        customer_id: CustomerId,
    ) -> Result<CommunicationHistory, InsightError> {
        let records = self.load(customer_id).await?;
        Ok(CommunicationHistory::compute(&records))
    }

    pub async fn claims_history(&self, customer_id: CustomerId) -> Result<ClaimsHistory, InsightError> {
        let records = self.load(customer_id).await?;
        Ok(ClaimsHistory::compute(&records))
    }

    // ------------------------------------------------------------------
    // Bulk and cross-customer
    // ------------------------------------------------------------------

    /// Recalculates each customer in turn; one failure does not stop the rest
    pub async fn bulk_recalculate(
        &self,
        customer_ids: &[CustomerId],
        force_refresh: bool,
    ) -> Result<BulkRecalculation, InsightError> {
        if customer_ids.is_empty() {
            return Err(InsightError::Validation("customer_ids cannot be empty".into()));
        }
        if customer_ids.len() > MAX_BULK_CUSTOMERS {
            return Err(InsightError::Validation(format!(
                "at most {} customers per request",
                MAX_BULK_CUSTOMERS
            )));
        }

        let mut updated = 0;
        let mut failed = Vec::new();
        for &customer_id in customer_ids {
            match self.customer_insights(customer_id, force_refresh).await {
                Ok(_) => updated += 1,
                Err(e) => {
                    warn!(%customer_id, error = %e, "Insight recalculation failed");
                    failed.push(BulkFailure {
                        customer_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            requested = customer_ids.len(),
            updated,
            failed = failed.len(),
            "Bulk insight recalculation finished"
        );
        Ok(BulkRecalculation {
            total_requested: customer_ids.len() as u32,
            updated_count: updated,
            failed,
        })
    }

    pub async fn dashboard(&self) -> Result<InsightsDashboard, InsightError> {
        let counts = self.source.customer_counts().await?;
        let sections = self.cached_sections().await?;

        let payments: Vec<_> = sections.values().filter_map(|s| s.payment.clone()).collect();
        let communications: Vec<_> = sections
            .values()
            .filter_map(|s| s.communication.clone())
            .collect();
        let summaries = self.summaries(sections).await?;

        Ok(InsightsDashboard::compute(counts, &payments, &communications, summaries))
    }

    /// Customers whose cached sections match `filter`, newest first
    pub async fn summary(
        &self,
        filter: &InsightFilter,
        page: PageRequest,
    ) -> Result<Page<CustomerInsightSummary>, InsightError> {
        let page = page.normalized();
        let sections = self.cached_sections().await?;
        let mut matching: Vec<_> = self
            .summaries(sections)
            .await?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        matching.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.customer_code.cmp(&b.customer_code))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load(&self, customer_id: CustomerId) -> Result<CustomerRecords, InsightError> {
        self.source
            .load_customer(customer_id)
            .await
            .map_err(|e| InsightError::from_source(customer_id, e))
    }

    /// A cached section if fresh and decodable
    async fn fresh<T: DeserializeOwned>(
        &self,
        customer_id: CustomerId,
        insight_type: InsightType,
        now: DateTime<Utc>,
    ) -> Result<Option<T>, InsightError> {
        match self.store.get(customer_id, insight_type).await? {
            Some(record) if record.is_fresh(now, self.ttl) => match record.decode() {
                Ok(value) => {
                    debug!(%customer_id, %insight_type, "Serving cached insight");
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!(%customer_id, %insight_type, error = %e, "Discarding undecodable cached insight");
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    async fn section<T, F>(
        &self,
        records: &CustomerRecords,
        insight_type: InsightType,
        force_refresh: bool,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<T, InsightError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(&CustomerRecords) -> T + Send,
    {
        let customer_id = records.customer.id;
        if !force_refresh {
            if let Some(cached) = self.fresh(customer_id, insight_type, now).await? {
                return Ok(cached);
            }
        }
        let value = compute(records);
        self.store
            .upsert(InsightRecord::new(customer_id, insight_type, &value, now)?)
            .await?;
        Ok(value)
    }

    /// One section, loading records only on a cache miss
    async fn single<T, F>(
        &self,
        customer_id: CustomerId,
        insight_type: InsightType,
        force_refresh: bool,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<T, InsightError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(&CustomerRecords) -> T + Send,
    {
        if !force_refresh {
            if let Some(cached) = self.fresh(customer_id, insight_type, now).await? {
                return Ok(cached);
            }
        }
        let records = self.load(customer_id).await?;
        self.section(&records, insight_type, true, now, compute).await
    }

    async fn cached_sections(&self) -> Result<HashMap<CustomerId, CachedSections>, InsightError> {
        let mut grouped: HashMap<CustomerId, CachedSections> = HashMap::new();
        for record in self.store.all().await? {
            let entry = grouped.entry(record.customer_id).or_default();
            entry.oldest = Some(
                entry
                    .oldest
                    .map_or(record.calculated_at, |t| t.min(record.calculated_at)),
            );
            let decoded = match record.insight_type {
                InsightType::Payment => record.decode().map(|v| entry.payment = Some(v)),
                InsightType::Communication => record.decode().map(|v| entry.communication = Some(v)),
                InsightType::Claims => record.decode().map(|v| entry.claims = Some(v)),
                InsightType::Profile => record.decode().map(|v| entry.profile = Some(v)),
            };
            if let Err(e) = decoded {
                warn!(customer_id = %record.customer_id, insight_type = %record.insight_type, error = %e, "Skipping undecodable cached insight");
            }
        }
        Ok(grouped)
    }

    /// Summaries for customers with all four sections cached
    async fn summaries(
        &self,
        sections: HashMap<CustomerId, CachedSections>,
    ) -> Result<Vec<CustomerInsightSummary>, InsightError> {
        let ids: Vec<CustomerId> = sections.keys().copied().collect();
        let customers = self.source.customers(&ids).await?;

        Ok(customers
            .iter()
            .filter_map(|customer| {
                let s = sections.get(&customer.id)?;
                Some(CustomerInsightSummary::build(
                    customer,
                    s.payment.as_ref()?,
                    s.communication.as_ref()?,
                    s.claims.as_ref()?,
                    s.profile.as_ref()?,
                    s.oldest?,
                ))
            })
            .collect())
    }
}
