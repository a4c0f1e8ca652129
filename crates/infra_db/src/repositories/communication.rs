//! Communication log repository
//!
//! Every write to a log recomputes the owning customer's
//! `last_contact_date` inside the same transaction, using
//! [`latest_contact_date`] over the customer's logs as they stand after the
//! write.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{CommunicationLogId, CustomerId, Page, PageRequest};
use domain_customer::{latest_contact_date, CommunicationChannel, CommunicationLog};

use crate::error::{parse_column, DatabaseError};
use crate::repositories::customer::{fetch_customer, set_last_contact};

const LOG_COLUMNS: &str = "id, customer_id, channel, communication_date, outcome, message_content, \
    response_received, is_deleted, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommunicationLogRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub channel: String,
    pub communication_date: DateTime<Utc>,
    pub outcome: String,
    pub message_content: String,
    pub response_received: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CommunicationLogRow> for CommunicationLog {
    type Error = DatabaseError;

    fn try_from(row: CommunicationLogRow) -> Result<Self, Self::Error> {
        Ok(CommunicationLog {
            id: CommunicationLogId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            channel: parse_column("channel", &row.channel)?,
            communication_date: row.communication_date,
            outcome: parse_column("outcome", &row.outcome)?,
            message_content: row.message_content,
            response_received: row.response_received,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommunicationFilter {
    pub customer_id: Option<CustomerId>,
    pub channel: Option<CommunicationChannel>,
}

#[derive(Debug, Clone)]
pub struct CommunicationRepository {
    pool: PgPool,
}

impl CommunicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: CommunicationLogId) -> Result<CommunicationLog, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_log(&mut conn, id).await
    }

    /// Live logs, newest first
    pub async fn list(
        &self,
        filter: &CommunicationFilter,
        page: PageRequest,
    ) -> Result<Page<CommunicationLog>, DatabaseError> {
        let page = page.normalized();
        let customer = filter.customer_id.map(|id| *id.as_uuid());
        let channel = filter.channel.map(|c| c.as_str());
        let where_clause = "WHERE NOT is_deleted
              AND ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::text IS NULL OR channel = $2)";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM communication_logs {}",
            where_clause
        ))
        .bind(customer)
        .bind(channel)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CommunicationLogRow>(&format!(
            "SELECT {} FROM communication_logs {}
             ORDER BY communication_date DESC, id LIMIT $3 OFFSET $4",
            LOG_COLUMNS, where_clause
        ))
        .bind(customer)
        .bind(channel)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(CommunicationLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    /// Every live log of a customer
    pub async fn for_customer(&self, customer_id: CustomerId) -> Result<Vec<CommunicationLog>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        customer_logs(&mut conn, customer_id).await
    }

    #[instrument(skip(self, log), fields(customer_id = %log.customer_id))]
    pub async fn create(&self, log: &CommunicationLog) -> Result<CommunicationLog, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        fetch_customer(&mut tx, log.customer_id, true).await?;

        let row = sqlx::query_as::<_, CommunicationLogRow>(&format!(
            "INSERT INTO communication_logs ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            LOG_COLUMNS, LOG_COLUMNS
        ))
        .bind(log.id.as_uuid())
        .bind(log.customer_id.as_uuid())
        .bind(log.channel.as_str())
        .bind(log.communication_date)
        .bind(log.outcome.as_str())
        .bind(&log.message_content)
        .bind(log.response_received)
        .bind(log.is_deleted)
        .bind(log.created_at)
        .bind(log.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        recompute_last_contact(&mut tx, log.customer_id, None).await?;
        tx.commit().await?;
        row.try_into()
    }

    /// Saves a log; moving it to another customer recomputes both customers
    #[instrument(skip(self, log), fields(log_id = %log.id))]
    pub async fn update(&self, log: &CommunicationLog) -> Result<CommunicationLog, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let previous = fetch_log(&mut tx, log.id).await?;
        fetch_customer(&mut tx, log.customer_id, true).await?;

        let row = sqlx::query_as::<_, CommunicationLogRow>(&format!(
            "UPDATE communication_logs
             SET customer_id = $2, channel = $3, communication_date = $4, outcome = $5,
                 message_content = $6, response_received = $7, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            LOG_COLUMNS
        ))
        .bind(log.id.as_uuid())
        .bind(log.customer_id.as_uuid())
        .bind(log.channel.as_str())
        .bind(log.communication_date)
        .bind(log.outcome.as_str())
        .bind(&log.message_content)
        .bind(log.response_received)
        .fetch_one(&mut *tx)
        .await?;

        recompute_last_contact(&mut tx, log.customer_id, None).await?;
        if previous.customer_id != log.customer_id {
            recompute_last_contact(&mut tx, previous.customer_id, None).await?;
        }
        tx.commit().await?;
        row.try_into()
    }

    /// Flags the log deleted; the log no longer counts as a contact
    #[instrument(skip(self), fields(log_id = %id))]
    pub async fn soft_delete(&self, id: CommunicationLogId) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut log = fetch_log(&mut tx, id).await?;
        if !log.soft_delete() {
            return Err(DatabaseError::not_found("CommunicationLog", id));
        }

        sqlx::query("UPDATE communication_logs SET is_deleted = TRUE, updated_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(log.updated_at)
            .execute(&mut *tx)
            .await?;

        recompute_last_contact(&mut tx, log.customer_id, Some(id)).await?;
        tx.commit().await?;
        debug!("Communication log soft-deleted");
        Ok(())
    }

    /// Removes the row outright
    #[instrument(skip(self), fields(log_id = %id))]
    pub async fn delete(&self, id: CommunicationLogId) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let customer_id: Uuid = sqlx::query_scalar("DELETE FROM communication_logs WHERE id = $1 RETURNING customer_id")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("CommunicationLog", id))?;

        recompute_last_contact(&mut tx, CustomerId::from_uuid(customer_id), None).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn fetch_log(conn: &mut PgConnection, id: CommunicationLogId) -> Result<CommunicationLog, DatabaseError> {
    sqlx::query_as::<_, CommunicationLogRow>(&format!(
        "SELECT {} FROM communication_logs WHERE id = $1",
        LOG_COLUMNS
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("CommunicationLog", id))?
    .try_into()
}

pub(crate) async fn customer_logs(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<Vec<CommunicationLog>, DatabaseError> {
    sqlx::query_as::<_, CommunicationLogRow>(&format!(
        "SELECT {} FROM communication_logs WHERE customer_id = $1 AND NOT is_deleted
         ORDER BY communication_date DESC",
        LOG_COLUMNS
    ))
    .bind(customer_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(CommunicationLog::try_from)
    .collect()
}

async fn recompute_last_contact(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    excluding: Option<CommunicationLogId>,
) -> Result<(), DatabaseError> {
    let logs = customer_logs(conn, customer_id).await?;
    let latest = latest_contact_date(&logs, excluding);
    set_last_contact(conn, customer_id, latest).await?;
    debug!(%customer_id, last_contact = ?latest, "Customer last contact recomputed");
    Ok(())
}
