//! Customer repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use core_kernel::{CustomerId, Page, PageRequest};
use domain_customer::{Customer, CustomerProfile, CustomerStatus, MetricsUpdate, PolicySnapshot};
use domain_policy::PolicyStatus;

use crate::error::{count_column, parse_column, DatabaseError};

pub(crate) const CUSTOMER_COLUMNS: &str = "id, customer_code, first_name, last_name, email, phone, \
    status, priority, profile, first_policy_date, total_policies, total_premium, \
    last_contact_date, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub customer_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub priority: String,
    pub profile: String,
    pub first_policy_date: Option<NaiveDate>,
    pub total_policies: i32,
    pub total_premium: Decimal,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DatabaseError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            customer_code: row.customer_code,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            status: parse_column("status", &row.status)?,
            priority: parse_column("priority", &row.priority)?,
            profile: parse_column("profile", &row.profile)?,
            first_policy_date: row.first_policy_date,
            total_policies: count_column("total_policies", row.total_policies)?,
            total_premium: row.total_premium,
            last_contact_date: row.last_contact_date,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// List filters; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Case-insensitive match on name, code or email
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub profile: Option<CustomerProfile>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SnapshotRow {
    premium_amount: Decimal,
    start_date: NaiveDate,
    status: String,
    is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A live customer
    pub async fn get(&self, id: CustomerId) -> Result<Customer, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut conn, id, false).await
    }

    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, DatabaseError> {
        let page = page.normalized();
        let search = filter.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let status = filter.status.map(|s| s.as_str());
        let profile = filter.profile.map(|p| p.as_str());

        let where_clause = "WHERE NOT is_deleted
              AND ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR profile = $2)
              AND ($3::text IS NULL OR first_name ILIKE $3 OR last_name ILIKE $3
                   OR customer_code ILIKE $3 OR email ILIKE $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customers {}", where_clause))
            .bind(status)
            .bind(profile)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers {} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
            CUSTOMER_COLUMNS, where_clause
        ))
        .bind(status)
        .bind(profile)
        .bind(&search)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Customer::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    /// Live customers among `ids`
    pub async fn find_many(&self, ids: &[CustomerId]) -> Result<Vec<Customer>, DatabaseError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = ANY($1) AND NOT is_deleted",
            CUSTOMER_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Customer::try_from).collect()
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn create(&self, customer: &Customer) -> Result<Customer, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "INSERT INTO customers ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {}",
            CUSTOMER_COLUMNS, CUSTOMER_COLUMNS
        ))
        .bind(customer.id.as_uuid())
        .bind(&customer.customer_code)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.status.as_str())
        .bind(customer.priority.as_str())
        .bind(customer.profile.as_str())
        .bind(customer.first_policy_date)
        .bind(customer.total_policies as i32)
        .bind(customer.total_premium)
        .bind(customer.last_contact_date)
        .bind(customer.is_deleted)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!("Customer created");
        row.try_into()
    }

    /// Saves editable fields; metrics and contact date are maintained elsewhere
    pub async fn update(&self, customer: &Customer) -> Result<Customer, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "UPDATE customers
             SET customer_code = $2, first_name = $3, last_name = $4, email = $5, phone = $6,
                 status = $7, priority = $8, profile = $9, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(customer.id.as_uuid())
        .bind(&customer.customer_code)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.status.as_str())
        .bind(customer.priority.as_str())
        .bind(customer.profile.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Customer", customer.id))?;

        row.try_into()
    }

    pub async fn soft_delete(&self, id: CustomerId) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE customers SET is_deleted = TRUE, status = 'inactive', updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Recomputes policy count, premium total and first policy date
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn refresh_metrics(&self, id: CustomerId) -> Result<MetricsUpdate, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut customer = fetch_customer(&mut tx, id, true).await?;

        let snapshots: Vec<PolicySnapshot> = sqlx::query_as::<_, SnapshotRow>(
            "SELECT premium_amount, start_date, status, is_deleted FROM policies WHERE customer_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| PolicySnapshot {
            premium_amount: row.premium_amount,
            start_date: row.start_date,
            is_active: row.status == PolicyStatus::Active.as_str(),
            is_deleted: row.is_deleted,
        })
        .collect();

        let update = customer.update_metrics(&snapshots);
        sqlx::query(
            "UPDATE customers
             SET total_policies = $2, total_premium = $3, first_policy_date = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(customer.total_policies as i32)
        .bind(customer.total_premium)
        .bind(customer.first_policy_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(update)
    }

    /// Refreshes every live customer; returns those whose policy count changed
    pub async fn refresh_all_metrics(&self) -> Result<Vec<(CustomerId, MetricsUpdate)>, DatabaseError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM customers WHERE NOT is_deleted ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        let mut changed = Vec::new();
        for id in ids.into_iter().map(CustomerId::from_uuid) {
            let update = self.refresh_metrics(id).await?;
            if update.old_count != update.new_count {
                changed.push((id, update));
            }
        }
        info!(changed = changed.len(), "Customer metrics refreshed");
        Ok(changed)
    }

    pub async fn counts(&self) -> Result<(u64, u64, u64), DatabaseError> {
        let (total, hni, with_claims): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE profile = 'hni'),
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM policy_claims pc JOIN policies p ON p.id = pc.policy_id
                    WHERE p.customer_id = c.id))
             FROM customers c WHERE NOT c.is_deleted",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((total as u64, hni as u64, with_claims as u64))
    }
}

/// Loads a live customer, optionally taking a row lock
pub(crate) async fn fetch_customer(
    conn: &mut PgConnection,
    id: CustomerId,
    for_update: bool,
) -> Result<Customer, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    sqlx::query_as::<_, CustomerRow>(&format!(
        "SELECT {} FROM customers WHERE id = $1 AND NOT is_deleted {}",
        CUSTOMER_COLUMNS, lock
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Customer", id))?
    .try_into()
}

/// Stores a recomputed `last_contact_date`
pub(crate) async fn set_last_contact(
    conn: &mut PgConnection,
    id: CustomerId,
    last_contact: Option<DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    sqlx::query("UPDATE customers SET last_contact_date = $2, updated_at = NOW() WHERE id = $1")
        .bind(id.as_uuid())
        .bind(last_contact)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
