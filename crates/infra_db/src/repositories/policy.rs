//! Policy type and policy repositories

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{CustomerId, Page, PageRequest, PolicyId, PolicyTypeId};
use domain_policy::{Policy, PolicyStatus, PolicyType, RENEWAL_WINDOW_DAYS};

use crate::error::{parse_column, DatabaseError};

const POLICY_TYPE_COLUMNS: &str =
    "id, name, code, description, base_premium_rate, is_active, created_at, updated_at";

pub(crate) const POLICY_COLUMNS: &str = "id, policy_number, customer_id, policy_type_id, start_date, \
    end_date, premium_amount, sum_assured, status, payment_frequency, nominee_name, \
    nominee_relationship, agent_name, agent_code, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PolicyTypeRow {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub base_premium_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PolicyTypeRow> for PolicyType {
    fn from(row: PolicyTypeRow) -> Self {
        PolicyType {
            id: PolicyTypeId::from_uuid(row.id),
            name: row.name,
            code: row.code,
            description: row.description,
            base_premium_rate: row.base_premium_rate,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PolicyRow {
    pub id: Uuid,
    pub policy_number: String,
    pub customer_id: Uuid,
    pub policy_type_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
    pub sum_assured: Decimal,
    pub status: String,
    pub payment_frequency: String,
    pub nominee_name: Option<String>,
    pub nominee_relationship: Option<String>,
    pub agent_name: Option<String>,
    pub agent_code: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PolicyRow> for Policy {
    type Error = DatabaseError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(Policy {
            id: PolicyId::from_uuid(row.id),
            policy_number: row.policy_number,
            customer_id: CustomerId::from_uuid(row.customer_id),
            policy_type_id: PolicyTypeId::from_uuid(row.policy_type_id),
            start_date: row.start_date,
            end_date: row.end_date,
            premium_amount: row.premium_amount,
            sum_assured: row.sum_assured,
            status: parse_column("status", &row.status)?,
            payment_frequency: parse_column("payment_frequency", &row.payment_frequency)?,
            nominee_name: row.nominee_name,
            nominee_relationship: row.nominee_relationship,
            agent_name: row.agent_name,
            agent_code: row.agent_code,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub customer_id: Option<CustomerId>,
    pub policy_type_id: Option<PolicyTypeId>,
    pub status: Option<PolicyStatus>,
}

#[derive(Debug, Clone)]
pub struct PolicyRepository {
    pool: PgPool,
}

impl PolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Policy types
    // ------------------------------------------------------------------

    /// Ordered by name; `active_only` hides retired types
    pub async fn list_types(&self, active_only: bool) -> Result<Vec<PolicyType>, DatabaseError> {
        let rows = sqlx::query_as::<_, PolicyTypeRow>(&format!(
            "SELECT {} FROM policy_types WHERE (NOT $1 OR is_active) ORDER BY name",
            POLICY_TYPE_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PolicyType::from).collect())
    }

    pub async fn get_type(&self, id: PolicyTypeId) -> Result<PolicyType, DatabaseError> {
        sqlx::query_as::<_, PolicyTypeRow>(&format!(
            "SELECT {} FROM policy_types WHERE id = $1",
            POLICY_TYPE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(PolicyType::from)
        .ok_or_else(|| DatabaseError::not_found("PolicyType", id))
    }

    pub async fn create_type(&self, policy_type: &PolicyType) -> Result<PolicyType, DatabaseError> {
        let row = sqlx::query_as::<_, PolicyTypeRow>(&format!(
            "INSERT INTO policy_types ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            POLICY_TYPE_COLUMNS, POLICY_TYPE_COLUMNS
        ))
        .bind(policy_type.id.as_uuid())
        .bind(&policy_type.name)
        .bind(&policy_type.code)
        .bind(&policy_type.description)
        .bind(policy_type.base_premium_rate)
        .bind(policy_type.is_active)
        .bind(policy_type.created_at)
        .bind(policy_type.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn update_type(&self, policy_type: &PolicyType) -> Result<PolicyType, DatabaseError> {
        sqlx::query_as::<_, PolicyTypeRow>(&format!(
            "UPDATE policy_types
             SET name = $2, code = $3, description = $4, base_premium_rate = $5, is_active = $6,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            POLICY_TYPE_COLUMNS
        ))
        .bind(policy_type.id.as_uuid())
        .bind(&policy_type.name)
        .bind(&policy_type.code)
        .bind(&policy_type.description)
        .bind(policy_type.base_premium_rate)
        .bind(policy_type.is_active)
        .fetch_optional(&self.pool)
        .await?
        .map(PolicyType::from)
        .ok_or_else(|| DatabaseError::not_found("PolicyType", policy_type.id))
    }

    // ------------------------------------------------------------------
    // Policies
    // ------------------------------------------------------------------

    pub async fn get(&self, id: PolicyId) -> Result<Policy, DatabaseError> {
        sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {} FROM policies WHERE id = $1 AND NOT is_deleted",
            POLICY_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Policy", id))?
        .try_into()
    }

    pub async fn list(&self, filter: &PolicyFilter, page: PageRequest) -> Result<Page<Policy>, DatabaseError> {
        let page = page.normalized();
        let customer = filter.customer_id.map(|id| *id.as_uuid());
        let policy_type = filter.policy_type_id.map(|id| *id.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        let where_clause = "WHERE NOT is_deleted
              AND ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR policy_type_id = $2)
              AND ($3::text IS NULL OR status = $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM policies {}", where_clause))
            .bind(customer)
            .bind(policy_type)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {} FROM policies {} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
            POLICY_COLUMNS, where_clause
        ))
        .bind(customer)
        .bind(policy_type)
        .bind(status)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(Policy::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    /// Active policies ending within the renewal window of `today`, soonest first
    ///
    /// Matches [`Policy::is_due_for_renewal`], so policies already past
    /// their end date but still active are included.
    pub async fn due_for_renewal(&self, today: NaiveDate) -> Result<Vec<Policy>, DatabaseError> {
        let horizon = today + Duration::days(RENEWAL_WINDOW_DAYS);
        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {} FROM policies
             WHERE NOT is_deleted AND status = $1 AND end_date <= $2
             ORDER BY end_date, policy_number",
            POLICY_COLUMNS
        ))
        .bind(PolicyStatus::Active.as_str())
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Policy::try_from).collect()
    }

    #[instrument(skip(self, policy), fields(policy_number = %policy.policy_number))]
    pub async fn create(&self, policy: &Policy) -> Result<Policy, DatabaseError> {
        sqlx::query_as::<_, PolicyRow>(&format!(
            "INSERT INTO policies ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING {}",
            POLICY_COLUMNS, POLICY_COLUMNS
        ))
        .bind(policy.id.as_uuid())
        .bind(&policy.policy_number)
        .bind(policy.customer_id.as_uuid())
        .bind(policy.policy_type_id.as_uuid())
        .bind(policy.start_date)
        .bind(policy.end_date)
        .bind(policy.premium_amount)
        .bind(policy.sum_assured)
        .bind(policy.status.as_str())
        .bind(policy.payment_frequency.as_str())
        .bind(&policy.nominee_name)
        .bind(&policy.nominee_relationship)
        .bind(&policy.agent_name)
        .bind(&policy.agent_code)
        .bind(policy.is_deleted)
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    pub async fn update(&self, policy: &Policy) -> Result<Policy, DatabaseError> {
        sqlx::query_as::<_, PolicyRow>(&format!(
            "UPDATE policies
             SET policy_number = $2, policy_type_id = $3, start_date = $4, end_date = $5,
                 premium_amount = $6, sum_assured = $7, status = $8, payment_frequency = $9,
                 nominee_name = $10, nominee_relationship = $11, agent_name = $12,
                 agent_code = $13, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            POLICY_COLUMNS
        ))
        .bind(policy.id.as_uuid())
        .bind(&policy.policy_number)
        .bind(policy.policy_type_id.as_uuid())
        .bind(policy.start_date)
        .bind(policy.end_date)
        .bind(policy.premium_amount)
        .bind(policy.sum_assured)
        .bind(policy.status.as_str())
        .bind(policy.payment_frequency.as_str())
        .bind(&policy.nominee_name)
        .bind(&policy.nominee_relationship)
        .bind(&policy.agent_name)
        .bind(&policy.agent_code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Policy", policy.id))?
        .try_into()
    }

    pub async fn soft_delete(&self, id: PolicyId) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE policies SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Policy", id));
        }
        Ok(())
    }

    /// Live policies of a customer
    pub async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<Policy>, DatabaseError> {
        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {} FROM policies WHERE customer_id = $1 AND NOT is_deleted ORDER BY start_date",
            POLICY_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Policy::try_from).collect()
    }
}
