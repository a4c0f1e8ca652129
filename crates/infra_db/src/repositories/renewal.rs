//! Renewal case and installment repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use core_kernel::{CustomerId, InstallmentId, Page, PageRequest, PaymentId, PolicyId, RenewalCaseId};
use domain_renewal::{
    CasePriority, DashboardSummary, Installment, RenewalCase, RenewalPaymentStatus, RenewalStatus,
};

use crate::error::{count_column, parse_column, DatabaseError};

const CASE_COLUMNS: &str = "id, case_number, batch_code, policy_id, customer_id, status, priority, \
    assigned_to, renewal_amount, payment_status, payment_date, communication_attempts, \
    last_contact_date, channel, channel_source, notes, created_at, updated_at";

const INSTALLMENT_COLUMNS: &str = "id, renewal_case_id, installment_number, due_date, amount_due, \
    status, payment_id, paid_at, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RenewalCaseRow {
    pub id: Uuid,
    pub case_number: String,
    pub batch_code: String,
    pub policy_id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub renewal_amount: Decimal,
    pub payment_status: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub communication_attempts: i32,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    pub channel_source: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RenewalCaseRow> for RenewalCase {
    type Error = DatabaseError;

    fn try_from(row: RenewalCaseRow) -> Result<Self, Self::Error> {
        Ok(RenewalCase {
            id: RenewalCaseId::from_uuid(row.id),
            case_number: row.case_number,
            batch_code: row.batch_code,
            policy_id: PolicyId::from_uuid(row.policy_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            status: parse_column("status", &row.status)?,
            priority: parse_column("priority", &row.priority)?,
            assigned_to: row.assigned_to,
            renewal_amount: row.renewal_amount,
            payment_status: parse_column("payment_status", &row.payment_status)?,
            payment_date: row.payment_date,
            communication_attempts: count_column("communication_attempts", row.communication_attempts)?,
            last_contact_date: row.last_contact_date,
            channel: row.channel.as_deref().map(|c| parse_column("channel", c)).transpose()?,
            channel_source: row
                .channel_source
                .as_deref()
                .map(|c| parse_column("channel_source", c))
                .transpose()?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InstallmentRow {
    pub id: Uuid,
    pub renewal_case_id: Uuid,
    pub installment_number: i32,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub status: String,
    pub payment_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = DatabaseError;

    fn try_from(row: InstallmentRow) -> Result<Self, Self::Error> {
        Ok(Installment {
            id: InstallmentId::from_uuid(row.id),
            renewal_case_id: RenewalCaseId::from_uuid(row.renewal_case_id),
            installment_number: count_column("installment_number", row.installment_number)?,
            due_date: row.due_date,
            amount_due: row.amount_due,
            status: parse_column("status", &row.status)?,
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<RenewalStatus>,
    pub priority: Option<CasePriority>,
    pub customer_id: Option<CustomerId>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenewalRepository {
    pool: PgPool,
}

impl RenewalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: RenewalCaseId) -> Result<RenewalCase, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_case(&mut conn, id).await
    }

    pub async fn list(&self, filter: &CaseFilter, page: PageRequest) -> Result<Page<RenewalCase>, DatabaseError> {
        let page = page.normalized();
        let status = filter.status.map(|s| s.as_str());
        let priority = filter.priority.map(|p| p.as_str());
        let customer = filter.customer_id.map(|id| *id.as_uuid());
        let where_clause = "WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR priority = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
              AND ($4::text IS NULL OR assigned_to = $4)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM renewal_cases {}", where_clause))
            .bind(status)
            .bind(priority)
            .bind(customer)
            .bind(&filter.assigned_to)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, RenewalCaseRow>(&format!(
            "SELECT {} FROM renewal_cases {} ORDER BY created_at DESC, id LIMIT $5 OFFSET $6",
            CASE_COLUMNS, where_clause
        ))
        .bind(status)
        .bind(priority)
        .bind(customer)
        .bind(&filter.assigned_to)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(RenewalCase::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    pub async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<RenewalCase>, DatabaseError> {
        let rows = sqlx::query_as::<_, RenewalCaseRow>(&format!(
            "SELECT {} FROM renewal_cases WHERE customer_id = $1 ORDER BY created_at DESC",
            CASE_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RenewalCase::try_from).collect()
    }

    /// Inserts the case together with its installment schedule
    #[instrument(skip(self, case, installments), fields(case_number = %case.case_number))]
    pub async fn create(
        &self,
        case: &RenewalCase,
        installments: &[Installment],
    ) -> Result<RenewalCase, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RenewalCaseRow>(&format!(
            "INSERT INTO renewal_cases ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING {}",
            CASE_COLUMNS, CASE_COLUMNS
        ))
        .bind(case.id.as_uuid())
        .bind(&case.case_number)
        .bind(&case.batch_code)
        .bind(case.policy_id.as_uuid())
        .bind(case.customer_id.as_uuid())
        .bind(case.status.as_str())
        .bind(case.priority.as_str())
        .bind(&case.assigned_to)
        .bind(case.renewal_amount)
        .bind(case.payment_status.as_str())
        .bind(case.payment_date)
        .bind(case.communication_attempts as i32)
        .bind(case.last_contact_date)
        .bind(case.channel.map(|c| c.as_str()))
        .bind(case.channel_source.map(|c| c.as_str()))
        .bind(&case.notes)
        .bind(case.created_at)
        .bind(case.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for installment in installments {
            insert_installment(&mut tx, installment).await?;
        }

        tx.commit().await?;
        info!(installments = installments.len(), "Renewal case created");
        row.try_into()
    }

    /// Saves workflow fields; payment status is derived from payments and left alone
    pub async fn update(&self, case: &RenewalCase) -> Result<RenewalCase, DatabaseError> {
        sqlx::query_as::<_, RenewalCaseRow>(&format!(
            "UPDATE renewal_cases
             SET batch_code = $2, status = $3, priority = $4, assigned_to = $5,
                 renewal_amount = $6, communication_attempts = $7, last_contact_date = $8,
                 channel = $9, channel_source = $10, notes = $11, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            CASE_COLUMNS
        ))
        .bind(case.id.as_uuid())
        .bind(&case.batch_code)
        .bind(case.status.as_str())
        .bind(case.priority.as_str())
        .bind(&case.assigned_to)
        .bind(case.renewal_amount)
        .bind(case.communication_attempts as i32)
        .bind(case.last_contact_date)
        .bind(case.channel.map(|c| c.as_str()))
        .bind(case.channel_source.map(|c| c.as_str()))
        .bind(&case.notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("RenewalCase", case.id))?
        .try_into()
    }

    /// Removes the case and its installments; payments keep their rows
    pub async fn delete(&self, id: RenewalCaseId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM renewal_cases WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("RenewalCase", id));
        }
        Ok(())
    }

    /// Schedule in installment order
    pub async fn installments(&self, case_id: RenewalCaseId) -> Result<Vec<Installment>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_case(&mut conn, case_id).await?;
        case_installments(&mut conn, case_id, false).await
    }

    /// Installments of every case belonging to a customer
    pub async fn customer_installments(&self, customer_id: CustomerId) -> Result<Vec<Installment>, DatabaseError> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {} FROM installments
             WHERE renewal_case_id IN (SELECT id FROM renewal_cases WHERE customer_id = $1)
             ORDER BY due_date, installment_number",
            INSTALLMENT_COLUMNS
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Installment::try_from).collect()
    }

    /// Flags waiting installments past their due date; returns how many changed
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE installments SET status = 'overdue', updated_at = NOW()
             WHERE status IN ('pending', 'scheduled') AND due_date < $1",
        )
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Dashboard figures over every case and completed, live payment
    pub async fn dashboard(&self) -> Result<DashboardSummary, DatabaseError> {
        let (total, in_progress, renewed, pending_action, failed, amount): (i64, i64, i64, i64, i64, Decimal) =
            sqlx::query_as(
                "SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'in_progress'),
                    COUNT(*) FILTER (WHERE status = 'renewed'),
                    COUNT(*) FILTER (WHERE status = 'pending_action'),
                    COUNT(*) FILTER (WHERE status = 'failed'),
                    COALESCE(SUM(renewal_amount), 0)
                 FROM renewal_cases",
            )
            .fetch_one(&self.pool)
            .await?;

        let collected: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM customer_payments
             WHERE status = 'completed' AND NOT is_deleted",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardSummary::from_totals(
            total as u64,
            in_progress as u64,
            renewed as u64,
            pending_action as u64,
            failed as u64,
            amount,
            collected,
        ))
    }
}

pub(crate) async fn fetch_case(conn: &mut PgConnection, id: RenewalCaseId) -> Result<RenewalCase, DatabaseError> {
    sqlx::query_as::<_, RenewalCaseRow>(&format!("SELECT {} FROM renewal_cases WHERE id = $1", CASE_COLUMNS))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("RenewalCase", id))?
        .try_into()
}

pub(crate) async fn case_installments(
    conn: &mut PgConnection,
    case_id: RenewalCaseId,
    for_update: bool,
) -> Result<Vec<Installment>, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    sqlx::query_as::<_, InstallmentRow>(&format!(
        "SELECT {} FROM installments WHERE renewal_case_id = $1 ORDER BY installment_number {}",
        INSTALLMENT_COLUMNS, lock
    ))
    .bind(case_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(Installment::try_from)
    .collect()
}

async fn insert_installment(conn: &mut PgConnection, installment: &Installment) -> Result<(), DatabaseError> {
    sqlx::query(&format!(
        "INSERT INTO installments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        INSTALLMENT_COLUMNS
    ))
    .bind(installment.id.as_uuid())
    .bind(installment.renewal_case_id.as_uuid())
    .bind(installment.installment_number as i32)
    .bind(installment.due_date)
    .bind(installment.amount_due)
    .bind(installment.status.as_str())
    .bind(installment.payment_id.map(|id| *id.as_uuid()))
    .bind(installment.paid_at)
    .bind(installment.created_at)
    .bind(installment.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn save_installment(conn: &mut PgConnection, installment: &Installment) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE installments SET status = $2, payment_id = $3, paid_at = $4, updated_at = $5 WHERE id = $1",
    )
    .bind(installment.id.as_uuid())
    .bind(installment.status.as_str())
    .bind(installment.payment_id.map(|id| *id.as_uuid()))
    .bind(installment.paid_at)
    .bind(installment.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes a derived payment status onto a case
pub(crate) async fn set_case_payment(
    conn: &mut PgConnection,
    case_id: RenewalCaseId,
    status: RenewalPaymentStatus,
    payment_date: Option<DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE renewal_cases
         SET payment_status = $2, payment_date = COALESCE($3, payment_date), updated_at = NOW()
         WHERE id = $1",
    )
    .bind(case_id.as_uuid())
    .bind(status.as_str())
    .bind(payment_date)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
