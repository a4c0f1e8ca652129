//! Campaign persistence port

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CampaignId, CustomerId, DomainPort, EmailTemplateId, PolicyId, PortError};

use crate::campaign::{Audience, Campaign, CampaignStatus};
use crate::recipient::CampaignRecipient;
use crate::template::{EmailTemplate, TemplateStatus, TemplateType};

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub template_type: Option<TemplateType>,
    pub status: Option<TemplateStatus>,
    /// Every tag must be present
    pub tags: Vec<String>,
    /// Case-insensitive match on name, subject or description
    pub search: Option<String>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &EmailTemplate) -> bool {
        if self.template_type.is_some_and(|t| t != template.template_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != template.status) {
            return false;
        }
        if !self
            .tags
            .iter()
            .all(|tag| template.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                template.name.to_lowercase().contains(&term)
                    || template.subject.to_lowercase().contains(&term)
                    || template
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// A customer picked by an [`Audience`] and the policy to mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudienceMember {
    pub customer_id: CustomerId,
    pub policy_id: Option<PolicyId>,
}

/// Customer and policy details used to personalise a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientContact {
    pub customer_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub policy_number: Option<String>,
    pub policy_type: Option<String>,
    pub policy_status: Option<String>,
    pub policy_start_date: Option<NaiveDate>,
    pub policy_end_date: Option<NaiveDate>,
    pub premium_amount: Option<Decimal>,
}

/// A recipient claimed for sending, with its contact details
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub recipient: CampaignRecipient,
    pub contact: RecipientContact,
}

/// Storage for templates, campaigns and recipients
///
/// Soft-deleted templates and campaigns are never returned.
#[async_trait]
pub trait CampaignStore: DomainPort {
    /// Newest first
    async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>, PortError>;

    async fn get_template(&self, id: EmailTemplateId) -> Result<EmailTemplate, PortError>;

    async fn create_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError>;

    async fn update_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError>;

    /// Bumps the usage counter without touching content
    async fn record_template_use(&self, id: EmailTemplateId, at: DateTime<Utc>) -> Result<(), PortError>;

    async fn delete_template(&self, id: EmailTemplateId) -> Result<(), PortError>;

    /// Newest first
    async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>, PortError>;

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, PortError>;

    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError>;

    async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError>;

    async fn delete_campaign(&self, id: CampaignId) -> Result<(), PortError>;

    async fn audience_members(&self, audience: Audience) -> Result<Vec<AudienceMember>, PortError>;

    /// Inserts recipients, skipping customers already on the campaign
    ///
    /// Returns how many were added.
    async fn add_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<u32, PortError>;

    /// Oldest first
    async fn list_recipients(&self, campaign_id: CampaignId) -> Result<Vec<CampaignRecipient>, PortError>;

    /// Moves every pending recipient of the campaign to queued and returns them
    ///
    /// Atomic per campaign: a recipient is handed to one caller only.
    async fn claim_pending(&self, campaign_id: CampaignId) -> Result<Vec<PendingDelivery>, PortError>;

    async fn recipient_by_tracking_id(&self, tracking_id: &str) -> Result<CampaignRecipient, PortError>;

    /// Writes delivery and engagement state
    async fn save_recipient(&self, recipient: &CampaignRecipient) -> Result<(), PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, CampaignRecipientId, HealthCheckResult, HealthCheckable};

    use crate::recipient::DeliveryStatus;

    #[derive(Debug, Clone)]
    struct Contact {
        details: RecipientContact,
        policy_id: Option<PolicyId>,
        expired: bool,
    }

    /// In-memory campaign store
    ///
    /// Customers are registered with [`InMemoryCampaignStore::add_contact`].
    #[derive(Debug, Default)]
    pub struct InMemoryCampaignStore {
        templates: Arc<RwLock<HashMap<EmailTemplateId, EmailTemplate>>>,
        campaigns: Arc<RwLock<HashMap<CampaignId, Campaign>>>,
        recipients: Arc<RwLock<HashMap<CampaignRecipientId, CampaignRecipient>>>,
        contacts: Arc<RwLock<Vec<(CustomerId, Contact)>>>,
    }

    impl InMemoryCampaignStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a customer; `expired` puts them in [`Audience::ExpiredPolicies`]
        pub async fn add_contact(
            &self,
            customer_id: CustomerId,
            policy_id: Option<PolicyId>,
            details: RecipientContact,
            expired: bool,
        ) {
            self.contacts.write().await.push((
                customer_id,
                Contact {
                    details,
                    policy_id,
                    expired,
                },
            ));
        }
    }

    impl DomainPort for InMemoryCampaignStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryCampaignStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::new(
                "mock-campaign-store",
                AdapterHealth::Healthy,
                0,
                Some("Mock adapter always healthy".to_string()),
            )
        }
    }

    #[async_trait]
    impl CampaignStore for InMemoryCampaignStore {
        async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>, PortError> {
            let mut templates: Vec<_> = self
                .templates
                .read()
                .await
                .values()
                .filter(|t| !t.is_deleted && filter.matches(t))
                .cloned()
                .collect();
            templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(templates)
        }

        async fn get_template(&self, id: EmailTemplateId) -> Result<EmailTemplate, PortError> {
            self.templates
                .read()
                .await
                .get(&id)
                .filter(|t| !t.is_deleted)
                .cloned()
                .ok_or_else(|| PortError::not_found("EmailTemplate", id))
        }

        async fn create_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError> {
            let mut templates = self.templates.write().await;
            if template.is_default {
                for other in templates
                    .values_mut()
                    .filter(|t| t.template_type == template.template_type)
                {
                    other.is_default = false;
                }
            }
            templates.insert(template.id, template.clone());
            Ok(template)
        }

        async fn update_template(&self, template: EmailTemplate) -> Result<EmailTemplate, PortError> {
            let mut templates = self.templates.write().await;
            if !templates.get(&template.id).is_some_and(|t| !t.is_deleted) {
                return Err(PortError::not_found("EmailTemplate", template.id));
            }
            if template.is_default {
                for other in templates
                    .values_mut()
                    .filter(|t| t.template_type == template.template_type)
                {
                    other.is_default = false;
                }
            }
            templates.insert(template.id, template.clone());
            Ok(template)
        }

        async fn record_template_use(&self, id: EmailTemplateId, at: DateTime<Utc>) -> Result<(), PortError> {
            let mut templates = self.templates.write().await;
            let template = templates
                .get_mut(&id)
                .filter(|t| !t.is_deleted)
                .ok_or_else(|| PortError::not_found("EmailTemplate", id))?;
            template.increment_usage(at);
            Ok(())
        }

        async fn delete_template(&self, id: EmailTemplateId) -> Result<(), PortError> {
            let mut templates = self.templates.write().await;
            match templates.get_mut(&id).filter(|t| !t.is_deleted) {
                Some(template) => {
                    template.soft_delete();
                    Ok(())
                }
                None => Err(PortError::not_found("EmailTemplate", id)),
            }
        }

        async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>, PortError> {
            let mut campaigns: Vec<_> = self
                .campaigns
                .read()
                .await
                .values()
                .filter(|c| !c.is_deleted && status.map_or(true, |s| c.status == s))
                .cloned()
                .collect();
            campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(campaigns)
        }

        async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, PortError> {
            self.campaigns
                .read()
                .await
                .get(&id)
                .filter(|c| !c.is_deleted)
                .cloned()
                .ok_or_else(|| PortError::not_found("Campaign", id))
        }

        async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError> {
            self.campaigns.write().await.insert(campaign.id, campaign.clone());
            Ok(campaign)
        }

        async fn update_campaign(&self, campaign: Campaign) -> Result<Campaign, PortError> {
            let mut campaigns = self.campaigns.write().await;
            if !campaigns.get(&campaign.id).is_some_and(|c| !c.is_deleted) {
                return Err(PortError::not_found("Campaign", campaign.id));
            }
            campaigns.insert(campaign.id, campaign.clone());
            Ok(campaign)
        }

        async fn delete_campaign(&self, id: CampaignId) -> Result<(), PortError> {
            let mut campaigns = self.campaigns.write().await;
            match campaigns.get_mut(&id).filter(|c| !c.is_deleted) {
                Some(campaign) => {
                    campaign.soft_delete();
                    Ok(())
                }
                None => Err(PortError::not_found("Campaign", id)),
            }
        }

        async fn audience_members(&self, audience: Audience) -> Result<Vec<AudienceMember>, PortError> {
            Ok(self
                .contacts
                .read()
                .await
                .iter()
                .filter(|(_, c)| audience == Audience::AllCustomers || c.expired)
                .map(|(customer_id, c)| AudienceMember {
                    customer_id: *customer_id,
                    policy_id: c.policy_id,
                })
                .collect())
        }

        async fn add_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<u32, PortError> {
            let mut stored = self.recipients.write().await;
            let mut existing: HashSet<(CampaignId, CustomerId)> =
                stored.values().map(|r| (r.campaign_id, r.customer_id)).collect();
            let mut added = 0;
            for recipient in recipients {
                if existing.insert((recipient.campaign_id, recipient.customer_id)) {
                    stored.insert(recipient.id, recipient);
                    added += 1;
                }
            }
            Ok(added)
        }

        async fn list_recipients(&self, campaign_id: CampaignId) -> Result<Vec<CampaignRecipient>, PortError> {
            let mut list: Vec<_> = self
                .recipients
                .read()
                .await
                .values()
                .filter(|r| r.campaign_id == campaign_id)
                .cloned()
                .collect();
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.as_uuid().cmp(b.id.as_uuid())));
            Ok(list)
        }

        async fn claim_pending(&self, campaign_id: CampaignId) -> Result<Vec<PendingDelivery>, PortError> {
            let contacts = self.contacts.read().await;
            let mut stored = self.recipients.write().await;
            let now = Utc::now();
            let mut claimed: Vec<PendingDelivery> = stored
                .values_mut()
                .filter(|r| r.campaign_id == campaign_id && r.email_status == DeliveryStatus::Pending)
                .map(|r| {
                    r.mark_queued(now);
                    let contact = contacts
                        .iter()
                        .find(|(id, _)| *id == r.customer_id)
                        .map(|(_, c)| c.details.clone())
                        .unwrap_or_default();
                    PendingDelivery {
                        recipient: r.clone(),
                        contact,
                    }
                })
                .collect();
            claimed.sort_by(|a, b| a.recipient.created_at.cmp(&b.recipient.created_at));
            Ok(claimed)
        }

        async fn recipient_by_tracking_id(&self, tracking_id: &str) -> Result<CampaignRecipient, PortError> {
            self.recipients
                .read()
                .await
                .values()
                .find(|r| r.tracking_id == tracking_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("CampaignRecipient", tracking_id))
        }

        async fn save_recipient(&self, recipient: &CampaignRecipient) -> Result<(), PortError> {
            let mut stored = self.recipients.write().await;
            match stored.get_mut(&recipient.id) {
                Some(existing) => {
                    *existing = recipient.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("CampaignRecipient", recipient.id)),
            }
        }
    }
}
