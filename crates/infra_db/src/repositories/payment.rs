//! Customer payment repository
//!
//! Each payment write re-derives the payment status of the affected renewal
//! case with [`case_payment_state`] and, for completed payments, settles the
//! earliest open installment of the case with [`link_payment`], all in the
//! transaction of the write.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{CustomerId, Page, PageRequest, PaymentId, RenewalCaseId};
use domain_renewal::{case_payment_state, link_payment, CustomerPayment, PaymentStatus};

use crate::error::{parse_column, DatabaseError};
use crate::repositories::renewal::{case_installments, fetch_case, save_installment, set_case_payment};

const PAYMENT_COLUMNS: &str = "id, customer_id, renewal_case_id, amount, payment_date, due_date, \
    status, mode, transaction_id, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub renewal_case_id: Option<Uuid>,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: String,
    pub mode: String,
    pub transaction_id: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for CustomerPayment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(CustomerPayment {
            id: PaymentId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            renewal_case_id: row.renewal_case_id.map(RenewalCaseId::from_uuid),
            amount: row.amount,
            payment_date: row.payment_date,
            due_date: row.due_date,
            status: parse_column("status", &row.status)?,
            mode: parse_column("mode", &row.mode)?,
            transaction_id: row.transaction_id,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub customer_id: Option<CustomerId>,
    pub renewal_case_id: Option<RenewalCaseId>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: PaymentId) -> Result<CustomerPayment, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let payment = fetch_payment(&mut conn, id).await?;
        if payment.is_deleted {
            return Err(DatabaseError::not_found("CustomerPayment", id));
        }
        Ok(payment)
    }

    /// Live payments, newest first
    pub async fn list(
        &self,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<CustomerPayment>, DatabaseError> {
        let page = page.normalized();
        let customer = filter.customer_id.map(|id| *id.as_uuid());
        let case = filter.renewal_case_id.map(|id| *id.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        let where_clause = "WHERE NOT is_deleted
              AND ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR renewal_case_id = $2)
              AND ($3::text IS NULL OR status = $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM customer_payments {}", where_clause))
            .bind(customer)
            .bind(case)
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM customer_payments {} ORDER BY payment_date DESC, id LIMIT $4 OFFSET $5",
            PAYMENT_COLUMNS, where_clause
        ))
        .bind(customer)
        .bind(case)
        .bind(status)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(CustomerPayment::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    pub async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<CustomerPayment>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM customer_payments WHERE customer_id = $1 AND NOT is_deleted
             ORDER BY payment_date DESC",
            PAYMENT_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CustomerPayment::try_from).collect()
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    pub async fn create(&self, payment: &CustomerPayment) -> Result<CustomerPayment, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let saved: CustomerPayment = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO customer_payments ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {}",
            PAYMENT_COLUMNS, PAYMENT_COLUMNS
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.customer_id.as_uuid())
        .bind(payment.renewal_case_id.map(|id| *id.as_uuid()))
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(payment.due_date)
        .bind(payment.status.as_str())
        .bind(payment.mode.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.is_deleted)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        if let Some(case_id) = saved.renewal_case_id {
            sync_case(&mut tx, case_id, None).await?;
            settle_installment(&mut tx, &saved).await?;
        }

        tx.commit().await?;
        Ok(saved)
    }

    /// Saves a payment; a payment moved between cases re-syncs both
    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    pub async fn update(&self, payment: &CustomerPayment) -> Result<CustomerPayment, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let previous = fetch_payment(&mut tx, payment.id).await?;
        if previous.is_deleted {
            return Err(DatabaseError::not_found("CustomerPayment", payment.id));
        }

        let saved: CustomerPayment = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE customer_payments
             SET renewal_case_id = $2, amount = $3, payment_date = $4, due_date = $5,
                 status = $6, mode = $7, transaction_id = $8, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.renewal_case_id.map(|id| *id.as_uuid()))
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(payment.due_date)
        .bind(payment.status.as_str())
        .bind(payment.mode.as_str())
        .bind(&payment.transaction_id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        if previous.renewal_case_id != saved.renewal_case_id || !saved.is_completed() {
            release_installment(&mut tx, saved.id).await?;
        }
        if let Some(old_case) = previous.renewal_case_id.filter(|c| Some(*c) != saved.renewal_case_id) {
            sync_case(&mut tx, old_case, None).await?;
        }
        if let Some(case_id) = saved.renewal_case_id {
            sync_case(&mut tx, case_id, None).await?;
            settle_installment(&mut tx, &saved).await?;
        }

        tx.commit().await?;
        Ok(saved)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn soft_delete(&self, id: PaymentId) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let payment = fetch_payment(&mut tx, id).await?;
        if payment.is_deleted {
            return Err(DatabaseError::not_found("CustomerPayment", id));
        }

        sqlx::query("UPDATE customer_payments SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        release_installment(&mut tx, id).await?;
        if let Some(case_id) = payment.renewal_case_id {
            sync_case(&mut tx, case_id, Some(id)).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn delete(&self, id: PaymentId) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let payment = fetch_payment(&mut tx, id).await?;

        release_installment(&mut tx, id).await?;
        sqlx::query("DELETE FROM customer_payments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        if let Some(case_id) = payment.renewal_case_id {
            sync_case(&mut tx, case_id, None).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn fetch_payment(conn: &mut PgConnection, id: PaymentId) -> Result<CustomerPayment, DatabaseError> {
    sqlx::query_as::<_, PaymentRow>(&format!("SELECT {} FROM customer_payments WHERE id = $1", PAYMENT_COLUMNS))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("CustomerPayment", id))?
        .try_into()
}

/// Re-derives a case's payment status from its remaining payments
async fn sync_case(
    conn: &mut PgConnection,
    case_id: RenewalCaseId,
    excluding: Option<PaymentId>,
) -> Result<(), DatabaseError> {
    fetch_case(conn, case_id).await?;
    let payments: Vec<CustomerPayment> = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {} FROM customer_payments WHERE renewal_case_id = $1 AND NOT is_deleted",
        PAYMENT_COLUMNS
    ))
    .bind(case_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(CustomerPayment::try_from)
    .collect::<Result<_, _>>()?;

    let state = case_payment_state(&payments, excluding);
    set_case_payment(conn, case_id, state.payment_status, state.payment_date).await?;
    debug!(%case_id, payment_status = %state.payment_status, "Case payment status synced");
    Ok(())
}

/// Links a completed payment to the earliest open installment of its case
async fn settle_installment(conn: &mut PgConnection, payment: &CustomerPayment) -> Result<(), DatabaseError> {
    let Some(case_id) = payment.renewal_case_id else {
        return Ok(());
    };
    let mut installments = case_installments(conn, case_id, true).await?;
    if let Some(paid) = link_payment(&mut installments, payment) {
        if let Some(installment) = installments.iter().find(|i| i.id == paid) {
            save_installment(conn, installment).await?;
            debug!(installment_id = %paid, "Installment settled");
        }
    }
    Ok(())
}

/// Reopens any installment the payment had settled
async fn release_installment(conn: &mut PgConnection, payment_id: PaymentId) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE installments
         SET status = CASE WHEN due_date < CURRENT_DATE THEN 'overdue' ELSE 'pending' END,
             payment_id = NULL, paid_at = NULL, updated_at = NOW()
         WHERE payment_id = $1",
    )
    .bind(payment_id.as_uuid())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
