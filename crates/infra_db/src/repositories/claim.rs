//! Policy claim repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{ClaimId, CustomerId, Page, PageRequest, PolicyId};
use domain_policy::{ClaimStatus, PolicyClaim};

use crate::error::{parse_column, DatabaseError};

const CLAIM_COLUMNS: &str = "id, claim_number, policy_id, claim_type, claim_amount, approved_amount, \
    incident_date, claim_date, status, rejection_reason, decided_at, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: Uuid,
    pub claim_number: String,
    pub policy_id: Uuid,
    pub claim_type: String,
    pub claim_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub incident_date: NaiveDate,
    pub claim_date: NaiveDate,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for PolicyClaim {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        Ok(PolicyClaim {
            id: ClaimId::from_uuid(row.id),
            claim_number: row.claim_number,
            policy_id: PolicyId::from_uuid(row.policy_id),
            claim_type: parse_column("claim_type", &row.claim_type)?,
            claim_amount: row.claim_amount,
            approved_amount: row.approved_amount,
            incident_date: row.incident_date,
            claim_date: row.claim_date,
            status: parse_column("status", &row.status)?,
            rejection_reason: row.rejection_reason,
            decided_at: row.decided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub policy_id: Option<PolicyId>,
    pub customer_id: Option<CustomerId>,
    pub status: Option<ClaimStatus>,
}

#[derive(Debug, Clone)]
pub struct ClaimRepository {
    pool: PgPool,
}

impl ClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: ClaimId) -> Result<PolicyClaim, DatabaseError> {
        sqlx::query_as::<_, ClaimRow>(&format!("SELECT {} FROM policy_claims WHERE id = $1", CLAIM_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PolicyClaim", id))?
            .try_into()
    }

    /// Newest claim first
    pub async fn list(&self, filter: &ClaimFilter, page: PageRequest) -> Result<Page<PolicyClaim>, DatabaseError> {
        let page = page.normalized();
        let policy = filter.policy_id.map(|id| *id.as_uuid());
        let customer = filter.customer_id.map(|id| *id.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        let where_clause = "WHERE ($1::uuid IS NULL OR policy_id = $1)
              AND ($2::uuid IS NULL OR policy_id IN (SELECT id FROM policies WHERE customer_id = $2))
              AND ($3::text IS NULL OR status = $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM policy_claims {}", where_clause))
            .bind(policy)
            .bind(customer)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {} FROM policy_claims {} ORDER BY claim_date DESC, id LIMIT $4 OFFSET $5",
            CLAIM_COLUMNS, where_clause
        ))
        .bind(policy)
        .bind(customer)
        .bind(status)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(PolicyClaim::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    /// Every claim against the customer's policies
    pub async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<PolicyClaim>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(&format!(
            "SELECT {} FROM policy_claims
             WHERE policy_id IN (SELECT id FROM policies WHERE customer_id = $1)
             ORDER BY claim_date DESC",
            CLAIM_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PolicyClaim::try_from).collect()
    }

    #[instrument(skip(self, claim), fields(claim_number = %claim.claim_number))]
    pub async fn create(&self, claim: &PolicyClaim) -> Result<PolicyClaim, DatabaseError> {
        sqlx::query_as::<_, ClaimRow>(&format!(
            "INSERT INTO policy_claims ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {}",
            CLAIM_COLUMNS, CLAIM_COLUMNS
        ))
        .bind(claim.id.as_uuid())
        .bind(&claim.claim_number)
        .bind(claim.policy_id.as_uuid())
        .bind(claim.claim_type.as_str())
        .bind(claim.claim_amount)
        .bind(claim.approved_amount)
        .bind(claim.incident_date)
        .bind(claim.claim_date)
        .bind(claim.status.as_str())
        .bind(&claim.rejection_reason)
        .bind(claim.decided_at)
        .bind(claim.created_at)
        .bind(claim.updated_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    /// Persists the claim's workflow fields after a status transition
    pub async fn save_status(&self, claim: &PolicyClaim) -> Result<PolicyClaim, DatabaseError> {
        sqlx::query_as::<_, ClaimRow>(&format!(
            "UPDATE policy_claims
             SET status = $2, approved_amount = $3, rejection_reason = $4, decided_at = $5,
                 updated_at = $6
             WHERE id = $1
             RETURNING {}",
            CLAIM_COLUMNS
        ))
        .bind(claim.id.as_uuid())
        .bind(claim.status.as_str())
        .bind(claim.approved_amount)
        .bind(&claim.rejection_reason)
        .bind(claim.decided_at)
        .bind(claim.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("PolicyClaim", claim.id))?
        .try_into()
    }
}
