//! Campaign delivery and engagement tracking

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{CampaignId, EmailTemplateId, PortError};
use domain_messaging::{EmailProviderService, OutgoingEmail, SendOutcome};

use crate::campaign::{Audience, Campaign, CampaignStatus};
use crate::error::CampaignError;
use crate::recipient::CampaignRecipient;
use crate::statistics::{CampaignMetrics, CampaignStatistics};
use crate::store::{CampaignStore, PendingDelivery, RecipientContact, TemplateFilter};
use crate::template::{render_text, EmailTemplate, RenderedEmail, TemplateContext};
use crate::tracking::{add_tracking, plain_text};

/// Body used when a campaign has no template
const DEFAULT_BODY: &str = "Dear {{customer_name}},\n\n{{campaign_message}}\n\n{{company_name}}";

#[derive(Debug, Clone)]
pub struct CampaignSettings {
    /// Public base URL that tracking links and renewal links point at
    pub public_base_url: String,
    /// Signs off messages and fills `{{company_name}}`
    pub company_name: String,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            company_name: "Renewals Team".to_string(),
        }
    }
}

/// Result of one send round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSummary {
    pub campaign_id: CampaignId,
    pub sent: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientsAdded {
    pub added: u32,
    pub total: u32,
}

/// Delivery reports received after a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryEvent {
    Delivered,
    Bounced { reason: Option<String> },
    Replied,
}

/// Personalisation values for one recipient
pub fn recipient_context(
    contact: &RecipientContact,
    campaign: &Campaign,
    settings: &CampaignSettings,
) -> TemplateContext {
    let email = contact.email.clone().unwrap_or_default();
    let phone = contact.phone.clone().unwrap_or_default();
    let mut context = TemplateContext::new()
        .with("customer_name", contact.customer_name.clone())
        .with("customer_email", email.clone())
        .with("customer_phone", phone.clone())
        .with("email", email)
        .with("phone", phone)
        .with("company_name", settings.company_name.clone())
        .with("campaign_name", campaign.name.clone())
        .with(
            "campaign_message",
            campaign.description.clone().unwrap_or_else(|| campaign.name.clone()),
        );

    if let Some(number) = &contact.policy_number {
        let date = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "N/A".to_string())
        };
        context.insert("policy_number", number.clone());
        context.insert("policy_type", contact.policy_type.clone().unwrap_or_else(|| "N/A".into()));
        context.insert("policy_status", contact.policy_status.clone().unwrap_or_else(|| "active".into()));
        context.insert("expiry_date", date(contact.policy_end_date));
        context.insert("start_date", date(contact.policy_start_date));
        context.insert(
            "premium_amount",
            contact
                .premium_amount
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "N/A".into()),
        );
        context.insert(
            "renewal_link",
            format!(
                "{}/renew/{}",
                settings.public_base_url.trim_end_matches('/'),
                urlencoding::encode(number)
            ),
        );
    }
    context
}

/// Manages templates and campaigns and sends campaign email through the
/// configured providers
pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    mailer: Arc<EmailProviderService>,
    settings: CampaignSettings,
}

impl CampaignService {
    pub fn new(store: Arc<dyn CampaignStore>, mailer: Arc<EmailProviderService>) -> Self {
        Self {
            store,
            mailer,
            settings: CampaignSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CampaignSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CampaignSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>, CampaignError> {
        Ok(self.store.list_templates(filter).await?)
    }

    pub async fn get_template(&self, id: EmailTemplateId) -> Result<EmailTemplate, CampaignError> {
        self.store
            .get_template(id)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::TemplateNotFound(id.to_string())))
    }

    pub async fn create_template(&self, template: EmailTemplate) -> Result<EmailTemplate, CampaignError> {
        template.validate()?;
        let created = self.store.create_template(template).await?;
        info!(template_id = %created.id, name = %created.name, "Email template created");
        Ok(created)
    }

    pub async fn update_template(&self, template: EmailTemplate) -> Result<EmailTemplate, CampaignError> {
        template.validate()?;
        let id = template.id;
        self.store
            .update_template(template)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::TemplateNotFound(id.to_string())))
    }

    pub async fn delete_template(&self, id: EmailTemplateId) -> Result<(), CampaignError> {
        self.store
            .delete_template(id)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::TemplateNotFound(id.to_string())))
    }

    pub async fn preview_template(
        &self,
        id: EmailTemplateId,
        context: &TemplateContext,
    ) -> Result<RenderedEmail, CampaignError> {
        Ok(self.get_template(id).await?.render(context))
    }

    /// Renders the template and sends it to `to` with a `[TEST]` subject
    #[instrument(skip(self, context), fields(template_id = %id))]
    pub async fn send_test_email(
        &self,
        id: EmailTemplateId,
        to: &str,
        context: &TemplateContext,
    ) -> Result<SendOutcome, CampaignError> {
        let template = self.get_template(id).await?;
        let rendered = template.render(context);
        let text = text_alternative(&rendered);
        let email = OutgoingEmail::new(to, format!("[TEST] {}", rendered.subject))
            .html(rendered.html_content)
            .text(text);
        let outcome = self.mailer.send_email(&email).await?;
        if let Err(e) = self.store.record_template_use(id, Utc::now()).await {
            warn!(error = %e, "Could not record template use");
        }
        info!(provider = %outcome.provider_name, "Template test email sent");
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Campaigns
    // ------------------------------------------------------------------

    pub async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>, CampaignError> {
        Ok(self.store.list_campaigns(status).await?)
    }

    pub async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.store
            .get_campaign(id)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::CampaignNotFound(id.to_string())))
    }

    pub async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, CampaignError> {
        if let Some(template_id) = campaign.template_id {
            self.get_template(template_id).await?;
        }
        let created = self.store.create_campaign(campaign).await?;
        info!(campaign_id = %created.id, name = %created.name, "Campaign created");
        Ok(created)
    }

    pub async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, CampaignError> {
        if let Some(template_id) = campaign.template_id {
            self.get_template(template_id).await?;
        }
        let id = campaign.id;
        self.store
            .update_campaign(campaign)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::CampaignNotFound(id.to_string())))
    }

    pub async fn change_status(&self, id: CampaignId, to: CampaignStatus) -> Result<Campaign, CampaignError> {
        let mut campaign = self.get_campaign(id).await?;
        campaign.transition(to, Utc::now())?;
        let updated = self.store.update_campaign(campaign).await?;
        info!(campaign_id = %id, status = %to, "Campaign status changed");
        Ok(updated)
    }

    pub async fn schedule_campaign(&self, id: CampaignId, at: DateTime<Utc>) -> Result<Campaign, CampaignError> {
        let mut campaign = self.get_campaign(id).await?;
        campaign.schedule(at, Utc::now())?;
        let updated = self.store.update_campaign(campaign).await?;
        info!(campaign_id = %id, scheduled_at = %at, "Campaign scheduled");
        Ok(updated)
    }

    pub async fn delete_campaign(&self, id: CampaignId) -> Result<(), CampaignError> {
        self.store
            .delete_campaign(id)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::CampaignNotFound(id.to_string())))
    }

    /// Adds the audience's customers and updates the target count
    pub async fn add_recipients(&self, id: CampaignId, audience: Audience) -> Result<RecipientsAdded, CampaignError> {
        let mut campaign = self.get_campaign(id).await?;
        if campaign.status == CampaignStatus::Cancelled {
            return Err(CampaignError::Validation("cannot add recipients to a cancelled campaign".into()));
        }

        let recipients: Vec<CampaignRecipient> = self
            .store
            .audience_members(audience)
            .await?
            .into_iter()
            .map(|m| CampaignRecipient::new(id, m.customer_id, m.policy_id))
            .collect();
        let added = self.store.add_recipients(recipients).await?;
        let total = self.store.list_recipients(id).await?.len() as u32;

        campaign.target_count = total;
        campaign.updated_at = Utc::now();
        self.store.update_campaign(campaign).await?;
        info!(campaign_id = %id, audience = %audience, added, total, "Campaign recipients added");
        Ok(RecipientsAdded { added, total })
    }

    pub async fn recipients(&self, id: CampaignId) -> Result<Vec<CampaignRecipient>, CampaignError> {
        self.get_campaign(id).await?;
        Ok(self.store.list_recipients(id).await?)
    }

    /// Sends the campaign email to every pending recipient
    ///
    /// Each recipient is claimed before sending, so overlapping calls never
    /// mail the same customer twice. A failed recipient is marked failed and
    /// the round continues. Afterwards the campaign statistics are
    /// recomputed; a round that sent anything completes the campaign, or
    /// leaves it running when some recipients failed.
    #[instrument(skip(self), fields(campaign_id = %id))]
    pub async fn send_campaign_emails(&self, id: CampaignId) -> Result<SendSummary, CampaignError> {
        let mut campaign = self.get_campaign(id).await?;
        if !campaign.includes_email() {
            return Err(CampaignError::NoEmailChannel(id.to_string()));
        }
        if matches!(campaign.status, CampaignStatus::Cancelled | CampaignStatus::Paused) {
            return Err(CampaignError::InvalidTransition {
                from: campaign.status,
                to: CampaignStatus::Running,
            });
        }
        let template = match campaign.template_id {
            Some(template_id) => {
                let template = self.get_template(template_id).await?;
                if !template.is_usable() {
                    return Err(CampaignError::Validation(format!(
                        "template '{}' is {}",
                        template.name, template.status
                    )));
                }
                Some(template)
            }
            None => None,
        };

        let deliveries = self.store.claim_pending(id).await?;
        let mut summary = SendSummary {
            campaign_id: id,
            sent: 0,
            failed: 0,
        };
        if deliveries.is_empty() {
            info!("No pending recipients");
            return Ok(summary);
        }
        debug!(count = deliveries.len(), "Recipients claimed");

        for PendingDelivery { mut recipient, contact } in deliveries {
            match self.deliver(&campaign, template.as_ref(), &recipient, &contact).await {
                Ok(outcome) => {
                    recipient.mark_sent(Utc::now());
                    summary.sent += 1;
                    debug!(recipient_id = %recipient.id, provider = %outcome.provider_name, "Campaign email sent");
                }
                Err(e) => {
                    recipient.mark_failed(e.to_string(), Utc::now());
                    summary.failed += 1;
                    warn!(recipient_id = %recipient.id, error = %e, "Campaign email failed");
                }
            }
            if let Err(e) = self.store.save_recipient(&recipient).await {
                warn!(recipient_id = %recipient.id, error = %e, "Could not save recipient state");
            }
        }

        let recipients = self.store.list_recipients(id).await?;
        campaign.apply_statistics(CampaignStatistics::from_recipients(&recipients));
        campaign.settle_after_send(summary.sent, summary.failed, Utc::now());
        self.store.update_campaign(campaign).await?;

        if summary.sent > 0 {
            if let Some(template) = &template {
                if let Err(e) = self.store.record_template_use(template.id, Utc::now()).await {
                    warn!(error = %e, "Could not record template use");
                }
            }
        }
        info!(sent = summary.sent, failed = summary.failed, "Campaign send round finished");
        Ok(summary)
    }

    /// Returns failed recipients with retries left to pending
    pub async fn retry_failed(&self, id: CampaignId) -> Result<u32, CampaignError> {
        self.get_campaign(id).await?;
        let mut reset = 0;
        for mut recipient in self.store.list_recipients(id).await? {
            if recipient.reset_for_retry(Utc::now()) {
                self.store.save_recipient(&recipient).await?;
                reset += 1;
            }
        }
        info!(campaign_id = %id, reset, "Failed recipients queued for retry");
        Ok(reset)
    }

    pub async fn metrics(&self, id: CampaignId) -> Result<CampaignMetrics, CampaignError> {
        self.get_campaign(id).await?;
        let recipients = self.store.list_recipients(id).await?;
        Ok(CampaignMetrics::from_recipients(&recipients))
    }

    /// Recomputes the stored counters from recipient state
    pub async fn refresh_statistics(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        let mut campaign = self.get_campaign(id).await?;
        let recipients = self.store.list_recipients(id).await?;
        campaign.apply_statistics(CampaignStatistics::from_recipients(&recipients));
        Ok(self.store.update_campaign(campaign).await?)
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    pub async fn track_open(&self, tracking_id: &str) -> Result<(), CampaignError> {
        self.track(tracking_id, |r| r.mark_opened(Utc::now())).await
    }

    pub async fn track_click(&self, tracking_id: &str) -> Result<(), CampaignError> {
        self.track(tracking_id, |r| r.mark_clicked(Utc::now())).await
    }

    pub async fn record_delivery(&self, tracking_id: &str, event: DeliveryEvent) -> Result<(), CampaignError> {
        self.track(tracking_id, |r| match event {
            DeliveryEvent::Delivered => r.mark_delivered(Utc::now()),
            DeliveryEvent::Bounced { reason } => r.mark_bounced(reason, Utc::now()),
            DeliveryEvent::Replied => r.mark_replied(Utc::now()),
        })
        .await
    }

    async fn track(
        &self,
        tracking_id: &str,
        change: impl FnOnce(&mut CampaignRecipient),
    ) -> Result<(), CampaignError> {
        let mut recipient = self
            .store
            .recipient_by_tracking_id(tracking_id)
            .await
            .map_err(|e| not_found_as(e, || CampaignError::UnknownTrackingId(tracking_id.to_string())))?;
        change(&mut recipient);
        self.store.save_recipient(&recipient).await?;
        self.refresh_statistics(recipient.campaign_id).await?;
        debug!(recipient_id = %recipient.id, engagement = %recipient.email_engagement, "Tracking event recorded");
        Ok(())
    }

    async fn deliver(
        &self,
        campaign: &Campaign,
        template: Option<&EmailTemplate>,
        recipient: &CampaignRecipient,
        contact: &RecipientContact,
    ) -> Result<SendOutcome, CampaignError> {
        let to = contact
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CampaignError::Validation("customer has no email address".into()))?;

        let context = recipient_context(contact, campaign, &self.settings);
        let mut rendered = match template {
            Some(template) => template.render(&context),
            None => RenderedEmail {
                subject: campaign.name.clone(),
                html_content: render_text(DEFAULT_BODY, &context),
                text_content: String::new(),
            },
        };
        if let Some(subject) = campaign.subject_line.as_deref().filter(|s| !s.trim().is_empty()) {
            rendered.subject = render_text(subject, &context);
        }

        let text = text_alternative(&rendered);
        let html = add_tracking(&rendered.html_content, &recipient.tracking_id, &self.settings.public_base_url);
        let email = OutgoingEmail::new(to, rendered.subject).html(html).text(text);
        Ok(self.mailer.send_email(&email).await?)
    }
}

fn text_alternative(rendered: &RenderedEmail) -> String {
    if rendered.text_content.trim().is_empty() {
        plain_text(&rendered.html_content)
    } else {
        rendered.text_content.clone()
    }
}

fn not_found_as(error: PortError, specific: impl FnOnce() -> CampaignError) -> CampaignError {
    if error.is_not_found() {
        specific()
    } else {
        CampaignError::Store(error)
    }
}
