//! PostgreSQL campaign store
//!
//! Implements [`CampaignStore`] over `email_templates`, `campaigns` and
//! `campaign_recipients`. Recipient contact details are joined from the
//! customer and policy tables when a send round claims them.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AdapterHealth, CampaignId, CampaignRecipientId, CustomerId, DomainPort, EmailTemplateId,
    HealthCheckResult, HealthCheckable, PolicyId, PortError,
};
use domain_campaign::{
    Audience, AudienceMember, Campaign, CampaignRecipient, CampaignStatistics, CampaignStatus,
    CampaignStore, EmailTemplate, PendingDelivery, RecipientContact, TemplateFilter,
};

use crate::error::{count_column, parse_column, DatabaseError};

const TEMPLATE_COLUMNS: &str = "id, name, subject, template_type, status, html_content, text_content, \
    description, tags, usage_count, last_used, is_default, is_deleted, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str = "id, name, description, status, channels, template_id, subject_line, \
    scheduled_at, started_at, completed_at, target_count, sent_count, delivered_count, opened_count, \
    clicked_count, total_responses, created_by, is_deleted, created_at, updated_at";

const RECIPIENT_COLUMNS: &str = "id, campaign_id, customer_id, policy_id, email_status, email_engagement, \
    tracking_id, email_sent_at, email_delivered_at, email_opened_at, email_clicked_at, email_replied_at, \
    email_error_message, retry_count, max_retries, has_responded, response_received_at, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    subject: String,
    template_type: String,
    status: String,
    html_content: String,
    text_content: String,
    description: Option<String>,
    tags: Vec<String>,
    usage_count: i32,
    last_used: Option<DateTime<Utc>>,
    is_default: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for EmailTemplate {
    type Error = DatabaseError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(EmailTemplate {
            id: EmailTemplateId::from_uuid(row.id),
            name: row.name,
            subject: row.subject,
            template_type: parse_column("template_type", &row.template_type)?,
            status: parse_column("status", &row.status)?,
            html_content: row.html_content,
            text_content: row.text_content,
            description: row.description,
            tags: row.tags,
            usage_count: count_column("usage_count", row.usage_count)?,
            last_used: row.last_used,
            is_default: row.is_default,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    status: String,
    channels: Vec<String>,
    template_id: Option<Uuid>,
    subject_line: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    target_count: i32,
    sent_count: i32,
    delivered_count: i32,
    opened_count: i32,
    clicked_count: i32,
    total_responses: i32,
    created_by: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DatabaseError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let channels = row
            .channels
            .iter()
            .map(|c| parse_column("channels", c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Campaign {
            id: CampaignId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            status: parse_column("status", &row.status)?,
            channels,
            template_id: row.template_id.map(EmailTemplateId::from_uuid),
            subject_line: row.subject_line,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            target_count: count_column("target_count", row.target_count)?,
            statistics: CampaignStatistics {
                sent_count: count_column("sent_count", row.sent_count)?,
                delivered_count: count_column("delivered_count", row.delivered_count)?,
                opened_count: count_column("opened_count", row.opened_count)?,
                clicked_count: count_column("clicked_count", row.clicked_count)?,
                total_responses: count_column("total_responses", row.total_responses)?,
            },
            created_by: row.created_by,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    campaign_id: Uuid,
    customer_id: Uuid,
    policy_id: Option<Uuid>,
    email_status: String,
    email_engagement: String,
    tracking_id: String,
    email_sent_at: Option<DateTime<Utc>>,
    email_delivered_at: Option<DateTime<Utc>>,
    email_opened_at: Option<DateTime<Utc>>,
    email_clicked_at: Option<DateTime<Utc>>,
    email_replied_at: Option<DateTime<Utc>>,
    email_error_message: Option<String>,
    retry_count: i32,
    max_retries: i32,
    has_responded: bool,
    response_received_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecipientRow> for CampaignRecipient {
    type Error = DatabaseError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        Ok(CampaignRecipient {
            id: CampaignRecipientId::from_uuid(row.id),
            campaign_id: CampaignId::from_uuid(row.campaign_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            policy_id: row.policy_id.map(PolicyId::from_uuid),
            email_status: parse_column("email_status", &row.email_status)?,
            email_engagement: parse_column("email_engagement", &row.email_engagement)?,
            tracking_id: row.tracking_id,
            email_sent_at: row.email_sent_at,
            email_delivered_at: row.email_delivered_at,
            email_opened_at: row.email_opened_at,
            email_clicked_at: row.email_clicked_at,
            email_replied_at: row.email_replied_at,
            email_error_message: row.email_error_message,
            retry_count: count_column("retry_count", row.retry_count)?,
            max_retries: count_column("max_retries", row.max_retries)?,
            has_responded: row.has_responded,
            response_received_at: row.response_received_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A claimed recipient joined with its customer and policy
#[derive(Debug, Clone, sqlx::FromRow)]
struct ClaimedRow {
    #[sqlx(flatten)]
    recipient: RecipientRow,
    customer_name: String,
    email: Option<String>,
    phone: Option<String>,
    policy_number: Option<String>,
    policy_type: Option<String>,
    policy_status: Option<String>,
    policy_start_date: Option<NaiveDate>,
    policy_end_date: Option<NaiveDate>,
    premium_amount: Option<Decimal>,
}

impl TryFrom<ClaimedRow> for PendingDelivery {
    type Error = DatabaseError;

    fn try_from(row: ClaimedRow) -> Result<Self, Self::Error> {
        Ok(PendingDelivery {
            recipient: row.recipient.try_into()?,
            contact: RecipientContact {
                customer_name: row.customer_name,
                email: row.email,
                phone: row.phone,
                policy_number: row.policy_number,
                policy_type: row.policy_type,
                policy_status: row.policy_status,
                policy_start_date: row.policy_start_date,
                policy_end_date: row.policy_end_date,
                premium_amount: row.premium_amount,
            },
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct MemberRow {
    customer_id: Uuid,
    policy_id: Option<Uuid>,
}

/// PostgreSQL-backed [`CampaignStore`]
#[derive(Debug, Clone)]
pub struct PostgresCampaignStore {
    pool: PgPool,
}

impl PostgresCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_template(&self, id: EmailTemplateId) -> Result<EmailTemplate, DatabaseError> {
        sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM email_templates WHERE id = $1 AND NOT is_deleted",
            TEMPLATE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("EmailTemplate", id))?
        .try_into()
    }

    async fn fetch_campaign(&self, id: CampaignId) -> Result<Campaign, DatabaseError> {
        sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1 AND NOT is_deleted",
            CAMPAIGN_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Campaign", id))?
        .try_into()
    }
}

/// Clears the default flag on other templates of the same type
async fn clear_default(conn: &mut PgConnection, template: &EmailTemplate) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE email_templates SET is_default = FALSE, updated_at = NOW()
         WHERE is_default AND template_type = $1 AND id <> $2",
    )
    .bind(template.template_type.as_str())
    .bind(template.id.as_uuid())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn channel_names(campaign: &Campaign) -> Vec<String> {
    campaign.channels.iter().map(|c| c.as_str().to_string()).collect()
}

impl DomainPort for PostgresCampaignStore {}

#[async_trait]
impl HealthCheckable for PostgresCampaignStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::new("postgres-campaign-store", AdapterHealth::Healthy, latency_ms, None),
            Err(e) => HealthCheckResult::new(
                "postgres-campaign-store",
                AdapterHealth::Unhealthy,
                latency_ms,
                Some(format!("Database health check failed: {}", e)),
            ),
        }
    }
}

#[async_trait]
impl CampaignStore for PostgresCampaignStore {
    async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>, PortError> {
        let tags: Vec<String> = filter.tags.iter().map(|t| t.to_lowercase()).collect();
        sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM email_templates
             WHERE NOT is_deleted
               AND ($1::text IS NULL OR template_type = $1)
               AND ($2::text IS NULL OR status = $2)
               AND (cardinality($3::text[]) = 0
                    OR ARRAY(SELECT lower(t) FROM unnest(tags) t) @> $3::text[])
               AND ($4::text IS NULL OR name ILIKE $4 OR subject ILIKE $4 OR description ILIKE $4)
             ORDER BY created_at DESC",
            TEMPLATE_COLUMNS
        ))
        .bind(filter.template_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(tags)
        .bind(filter.search.as_ref().map(|term| format!("%{}%", term)))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .into_iter()
        .map(|row| EmailTemplate::try_from(row).map_err(PortError::from))
        .collect()
    }

    async fn get_template(&self, id: EmailTemplateId) -> Result<EmailTemplate, PortError> {
        Ok(self.fetch_template(id).await?)
    }

    #[instrument(skip(self, template), fields(template = %template.name))]
    async fn create_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        if template.is_default {
            clear_default(&mut tx, &template).await?;
        }

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO email_templates ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {}",
            TEMPLATE_COLUMNS, TEMPLATE_COLUMNS
        ))
        .bind(template.id.as_uuid())
        .bind(&template.name)
        .bind(&template.subject)
        .bind(template.template_type.as_str())
        .bind(template.status.as_str())
        .bind(&template.html_content)
        .bind(&template.text_content)
        .bind(&template.description)
        .bind(&template.tags)
        .bind(template.usage_count as i32)
        .bind(template.last_used)
        .bind(template.is_default)
        .bind(template.is_deleted)
        .bind(template.created_at)
        .bind(template.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Email template created");
        Ok(row.try_into()?)
    }

    #[instrument(skip(self, template), fields(template_id = %template.id))]
    async fn update_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        if template.is_default {
            clear_default(&mut tx, &template).await?;
        }

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "UPDATE email_templates
             SET name = $2, subject = $3, template_type = $4, status = $5, html_content = $6,
                 text_content = $7, description = $8, tags = $9, is_default = $10, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            TEMPLATE_COLUMNS
        ))
        .bind(template.id.as_uuid())
        .bind(&template.name)
        .bind(&template.subject)
        .bind(template.template_type.as_str())
        .bind(template.status.as_str())
        .bind(&template.html_content)
        .bind(&template.text_content)
        .bind(&template.description)
        .bind(&template.tags)
        .bind(template.is_default)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("EmailTemplate", template.id))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(row.try_into()?)
    }

    async fn record_template_use(&self, id: EmailTemplateId, at: DateTime<Utc>) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE email_templates
             SET usage_count = usage_count + 1, last_used = $2, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("EmailTemplate", id).into());
        }
        Ok(())
    }

    async fn delete_template(&self, id: EmailTemplateId) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE email_templates SET is_deleted = TRUE, is_default = FALSE, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("EmailTemplate", id).into());
        }
        Ok(())
    }

    async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>, PortError> {
        sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns
             WHERE NOT is_deleted AND ($1::TEXT IS NULL OR status = $1)
             ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .into_iter()
        .map(|row| Campaign::try_from(row).map_err(PortError::from))
        .collect()
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, PortError> {
        Ok(self.fetch_campaign(id).await?)
    }

    #[instrument(skip(self, campaign), fields(campaign = %campaign.name))]
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError> {
        let stats = &campaign.statistics;
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "INSERT INTO campaigns ({})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
             RETURNING {}",
            CAMPAIGN_COLUMNS, CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id.as_uuid())
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.status.as_str())
        .bind(channel_names(&campaign))
        .bind(campaign.template_id.map(|t| *t.as_uuid()))
        .bind(&campaign.subject_line)
        .bind(campaign.scheduled_at)
        .bind(campaign.started_at)
        .bind(campaign.completed_at)
        .bind(campaign.target_count as i32)
        .bind(stats.sent_count as i32)
        .bind(stats.delivered_count as i32)
        .bind(stats.opened_count as i32)
        .bind(stats.clicked_count as i32)
        .bind(stats.total_responses as i32)
        .bind(&campaign.created_by)
        .bind(campaign.is_deleted)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        debug!("Campaign created");
        Ok(row.try_into()?)
    }

    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError> {
        let stats = &campaign.statistics;
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns
             SET name = $2, description = $3, status = $4, channels = $5, template_id = $6,
                 subject_line = $7, scheduled_at = $8, started_at = $9, completed_at = $10,
                 target_count = $11, sent_count = $12, delivered_count = $13, opened_count = $14,
                 clicked_count = $15, total_responses = $16, updated_at = NOW()
             WHERE id = $1 AND NOT is_deleted
             RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id.as_uuid())
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.status.as_str())
        .bind(channel_names(&campaign))
        .bind(campaign.template_id.map(|t| *t.as_uuid()))
        .bind(&campaign.subject_line)
        .bind(campaign.scheduled_at)
        .bind(campaign.started_at)
        .bind(campaign.completed_at)
        .bind(campaign.target_count as i32)
        .bind(stats.sent_count as i32)
        .bind(stats.delivered_count as i32)
        .bind(stats.opened_count as i32)
        .bind(stats.clicked_count as i32)
        .bind(stats.total_responses as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Campaign", campaign.id))?;

        Ok(row.try_into()?)
    }

    async fn delete_campaign(&self, id: CampaignId) -> Result<(), PortError> {
        let result = sqlx::query("UPDATE campaigns SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_deleted")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Campaign", id).into());
        }
        Ok(())
    }

    async fn audience_members(&self, audience: Audience) -> Result<Vec<AudienceMember>, PortError> {
        let sql = match audience {
            Audience::AllCustomers => {
                "SELECT c.id AS customer_id,
                        (SELECT p.id FROM policies p
                         WHERE p.customer_id = c.id AND NOT p.is_deleted
                         ORDER BY p.created_at DESC LIMIT 1) AS policy_id
                 FROM customers c
                 WHERE NOT c.is_deleted
                 ORDER BY c.created_at"
            }
            Audience::ExpiredPolicies => {
                "SELECT DISTINCT ON (p.customer_id) p.customer_id, p.id AS policy_id
                 FROM policies p
                 JOIN customers c ON c.id = p.customer_id AND NOT c.is_deleted
                 WHERE NOT p.is_deleted
                   AND p.end_date < CURRENT_DATE
                   AND NOT EXISTS (
                       SELECT 1 FROM renewal_cases rc
                       WHERE rc.policy_id = p.id AND rc.status = 'renewed')
                 ORDER BY p.customer_id, p.end_date DESC"
            }
        };

        Ok(sqlx::query_as::<_, MemberRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?
            .into_iter()
            .map(|row| AudienceMember {
                customer_id: CustomerId::from_uuid(row.customer_id),
                policy_id: row.policy_id.map(PolicyId::from_uuid),
            })
            .collect())
    }

    #[instrument(skip(self, recipients), fields(count = recipients.len()))]
    async fn add_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<u32, PortError> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let mut added = 0u32;
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        for r in &recipients {
            let result = sqlx::query(&format!(
                "INSERT INTO campaign_recipients ({})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                 ON CONFLICT (campaign_id, customer_id) DO NOTHING",
                RECIPIENT_COLUMNS
            ))
            .bind(r.id.as_uuid())
            .bind(r.campaign_id.as_uuid())
            .bind(r.customer_id.as_uuid())
            .bind(r.policy_id.map(|p| *p.as_uuid()))
            .bind(r.email_status.as_str())
            .bind(r.email_engagement.as_str())
            .bind(&r.tracking_id)
            .bind(r.email_sent_at)
            .bind(r.email_delivered_at)
            .bind(r.email_opened_at)
            .bind(r.email_clicked_at)
            .bind(r.email_replied_at)
            .bind(&r.email_error_message)
            .bind(r.retry_count as i32)
            .bind(r.max_retries as i32)
            .bind(r.has_responded)
            .bind(r.response_received_at)
            .bind(r.created_at)
            .bind(r.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
            added += result.rows_affected() as u32;
        }
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(added, "Campaign recipients inserted");
        Ok(added)
    }

    async fn list_recipients(&self, campaign_id: CampaignId) -> Result<Vec<CampaignRecipient>, PortError> {
        sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {} FROM campaign_recipients WHERE campaign_id = $1 ORDER BY created_at, id",
            RECIPIENT_COLUMNS
        ))
        .bind(campaign_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .into_iter()
        .map(|row| CampaignRecipient::try_from(row).map_err(PortError::from))
        .collect()
    }

    /// A single UPDATE flips pending rows to queued; a concurrent round
    /// re-checks the status after the row lock and skips what was taken
    #[instrument(skip(self), fields(campaign_id = %campaign_id))]
    async fn claim_pending(&self, campaign_id: CampaignId) -> Result<Vec<PendingDelivery>, PortError> {
        let claimed = sqlx::query_as::<_, ClaimedRow>(&format!(
            "WITH claimed AS (
                 UPDATE campaign_recipients
                 SET email_status = 'queued', updated_at = NOW()
                 WHERE campaign_id = $1 AND email_status = 'pending'
                 RETURNING {}
             )
             SELECT claimed.*,
                    TRIM(c.first_name || ' ' || c.last_name) AS customer_name,
                    c.email, c.phone,
                    p.policy_number, pt.name AS policy_type, p.status AS policy_status,
                    p.start_date AS policy_start_date, p.end_date AS policy_end_date,
                    p.premium_amount
             FROM claimed
             JOIN customers c ON c.id = claimed.customer_id
             LEFT JOIN policies p ON p.id = claimed.policy_id
             LEFT JOIN policy_types pt ON pt.id = p.policy_type_id
             ORDER BY claimed.created_at, claimed.id",
            RECIPIENT_COLUMNS
        ))
        .bind(campaign_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        debug!(count = claimed.len(), "Recipients claimed");
        claimed
            .into_iter()
            .map(|row| PendingDelivery::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn recipient_by_tracking_id(&self, tracking_id: &str) -> Result<CampaignRecipient, PortError> {
        Ok(sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {} FROM campaign_recipients WHERE tracking_id = $1",
            RECIPIENT_COLUMNS
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("CampaignRecipient", tracking_id))?
        .try_into()?)
    }

    async fn save_recipient(&self, recipient: &CampaignRecipient) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE campaign_recipients
             SET email_status = $2, email_engagement = $3, email_sent_at = $4, email_delivered_at = $5,
                 email_opened_at = $6, email_clicked_at = $7, email_replied_at = $8,
                 email_error_message = $9, retry_count = $10, has_responded = $11,
                 response_received_at = $12, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(recipient.id.as_uuid())
        .bind(recipient.email_status.as_str())
        .bind(recipient.email_engagement.as_str())
        .bind(recipient.email_sent_at)
        .bind(recipient.email_delivered_at)
        .bind(recipient.email_opened_at)
        .bind(recipient.email_clicked_at)
        .bind(recipient.email_replied_at)
        .bind(&recipient.email_error_message)
        .bind(recipient.retry_count as i32)
        .bind(recipient.has_responded)
        .bind(recipient.response_received_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("CampaignRecipient", recipient.id).into());
        }
        Ok(())
    }
}
