//! Tests for domain_campaign

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{CampaignId, CustomerId, PolicyId, PortError};
use domain_campaign::store::mock::InMemoryCampaignStore;
use domain_campaign::{
    Audience, Campaign, CampaignChannel, CampaignError, CampaignService, CampaignSettings,
    CampaignStatus, CampaignStore, DeliveryEvent, DeliveryStatus, EmailTemplate, EngagementStatus,
    RecipientContact, TemplateContext, TemplateType,
};
use domain_messaging::store::mock::InMemoryProviderStore;
use domain_messaging::{
    CredentialVault, EmailProviderConfig, EmailProviderService, EmailTransport, MessagingError,
    OutgoingEmail, ProviderCredentials, ProviderType, SendReceipt, TransportFactory,
};

// ============================================================================
// Harness
// ============================================================================

type Outbox = Arc<Mutex<Vec<OutgoingEmail>>>;

struct RecordingTransport {
    delay_ms: u64,
    outbox: Outbox,
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, PortError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.outbox.lock().unwrap().push(email.clone());
        Ok(SendReceipt {
            message_id: "msg-1".into(),
        })
    }

    async fn health_check(&self) -> Result<(), PortError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    delay_ms: u64,
    outbox: Outbox,
}

impl TransportFactory for RecordingFactory {
    fn build(
        &self,
        _provider: &EmailProviderConfig,
        _credentials: ProviderCredentials,
    ) -> Result<Box<dyn EmailTransport>, MessagingError> {
        Ok(Box::new(RecordingTransport {
            delay_ms: self.delay_ms,
            outbox: self.outbox.clone(),
        }))
    }
}

struct Harness {
    service: CampaignService,
    store: Arc<InMemoryCampaignStore>,
    outbox: Outbox,
}

async fn harness_with_delay(delay_ms: u64) -> Harness {
    let providers = Arc::new(
        InMemoryProviderStore::with_providers(vec![EmailProviderConfig::new(
            "Primary",
            ProviderType::Sendgrid,
            "renewals@insurer.test",
        )])
        .await,
    );
    let outbox = Outbox::default();
    let factory = Arc::new(RecordingFactory {
        delay_ms,
        outbox: outbox.clone(),
    });
    let vault = Arc::new(CredentialVault::from_base64_key(&BASE64.encode([9u8; 32])).unwrap());
    let mailer = Arc::new(EmailProviderService::new(providers, vault, factory));

    let store = Arc::new(InMemoryCampaignStore::new());
    let service = CampaignService::new(store.clone(), mailer).with_settings(CampaignSettings {
        public_base_url: "https://renewals.insurer.test".into(),
        company_name: "Insurer Ltd".into(),
    });
    Harness { service, store, outbox }
}

async fn harness() -> Harness {
    harness_with_delay(0).await
}

fn contact(name: &str, email: Option<&str>, policy_number: &str) -> RecipientContact {
    RecipientContact {
        customer_name: name.into(),
        email: email.map(str::to_string),
        policy_number: Some(policy_number.into()),
        policy_type: Some("Motor".into()),
        policy_end_date: NaiveDate::from_ymd_opt(2026, 9, 30),
        premium_amount: Some(dec!(1200.5)),
        ..Default::default()
    }
}

async fn add_contact(h: &Harness, name: &str, email: Option<&str>, number: &str, expired: bool) -> CustomerId {
    let customer_id = CustomerId::new_v7();
    h.store
        .add_contact(customer_id, Some(PolicyId::new_v7()), contact(name, email, number), expired)
        .await;
    customer_id
}

async fn reminder_template(h: &Harness) -> EmailTemplate {
    let template = EmailTemplate::new(
        "Renewal reminder",
        "{{customer_name}}, {{policy_number}} expires {{expiry_date}}",
        TemplateType::RenewalReminder,
        r#"<html><body><p>Dear {{customer_name}},</p><p>Premium {{premium_amount}}.</p><a href="{{renewal_link}}">Renew</a></body></html>"#,
    )
    .unwrap()
    .activate();
    h.service.create_template(template).await.unwrap()
}

async fn email_campaign(h: &Harness, template: Option<&EmailTemplate>) -> Campaign {
    let mut campaign = Campaign::new("September renewals", vec![CampaignChannel::Email], "agent-1").unwrap();
    if let Some(t) = template {
        campaign = campaign.with_template(t.id);
    }
    h.service.create_campaign(campaign).await.unwrap()
}

// ============================================================================
// Sending Tests
// ============================================================================

mod sending_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_personalises_and_tracks_each_email() {
        let h = harness().await;
        add_contact(&h, "Asha Rao", Some("asha@example.com"), "POL-100", true).await;
        let template = reminder_template(&h).await;
        let campaign = email_campaign(&h, Some(&template)).await;

        let added = h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();
        assert_eq!((added.added, added.total), (1, 1));

        let summary = h.service.send_campaign_emails(campaign.id).await.unwrap();
        assert_eq!((summary.sent, summary.failed), (1, 0));

        let outbox = h.outbox.lock().unwrap().clone();
        assert_eq!(outbox.len(), 1);
        let sent = &outbox[0];
        assert_eq!(sent.to, vec!["asha@example.com".to_string()]);
        assert_eq!(sent.subject, "Asha Rao, POL-100 expires 2026-09-30");

        let recipient = &h.service.recipients(campaign.id).await.unwrap()[0];
        let html = sent.html_body.as_deref().unwrap();
        assert!(html.contains("Premium 1200.50."));
        assert!(html.contains(&format!("/track/open?t={}", recipient.tracking_id)));
        assert!(html.contains(&format!(
            "/track/click?t={}&url=https%3A%2F%2Frenewals.insurer.test%2Frenew%2FPOL-100",
            recipient.tracking_id
        )));
        assert!(sent.text_body.as_deref().unwrap().contains("Dear Asha Rao,"));

        assert_eq!(recipient.email_status, DeliveryStatus::Sent);
        let stored = h.service.get_campaign(campaign.id).await.unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(stored.statistics.sent_count, 1);
        assert_eq!(h.service.get_template(template.id).await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_missing_address_fails_only_that_recipient() {
        let h = harness().await;
        add_contact(&h, "Asha Rao", Some("asha@example.com"), "POL-100", false).await;
        add_contact(&h, "Ravi Kumar", None, "POL-101", false).await;
        let campaign = email_campaign(&h, None).await;
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();

        let summary = h.service.send_campaign_emails(campaign.id).await.unwrap();
        assert_eq!((summary.sent, summary.failed), (1, 1));

        let stored = h.service.get_campaign(campaign.id).await.unwrap();
        assert_eq!(stored.status, CampaignStatus::Running);

        let failed: Vec<_> = h
            .service
            .recipients(campaign.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.email_status == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].retry_count, 1);
        assert!(failed[0].email_error_message.as_deref().unwrap().contains("no email address"));
    }

    #[tokio::test]
    async fn test_retry_failed_until_retries_run_out() {
        let h = harness().await;
        add_contact(&h, "Ravi Kumar", Some("not-an-address"), "POL-101", false).await;
        let campaign = email_campaign(&h, None).await;
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();

        for _ in 0..3 {
            let summary = h.service.send_campaign_emails(campaign.id).await.unwrap();
            assert_eq!(summary.failed, 1);
            h.service.retry_failed(campaign.id).await.unwrap();
        }

        let recipient = &h.service.recipients(campaign.id).await.unwrap()[0];
        assert_eq!(recipient.retry_count, 3);
        assert_eq!(recipient.email_status, DeliveryStatus::Failed);
        assert_eq!(h.service.retry_failed(campaign.id).await.unwrap(), 0);
        assert!(h.outbox.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sent_recipients_are_not_mailed_again() {
        let h = harness().await;
        add_contact(&h, "Asha Rao", Some("asha@example.com"), "POL-100", false).await;
        let campaign = email_campaign(&h, None).await;
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();

        h.service.send_campaign_emails(campaign.id).await.unwrap();
        let again = h.service.send_campaign_emails(campaign.id).await.unwrap();

        assert_eq!((again.sent, again.failed), (0, 0));
        assert_eq!(h.outbox.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_sends_mail_each_recipient_once() {
        let h = harness_with_delay(30).await;
        for i in 0..4 {
            add_contact(&h, "Customer", Some(&format!("c{i}@example.com")), &format!("POL-{i}"), false).await;
        }
        let campaign = email_campaign(&h, None).await;
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();

        let (first, second) = tokio::join!(
            h.service.send_campaign_emails(campaign.id),
            h.service.send_campaign_emails(campaign.id)
        );
        assert_eq!(first.unwrap().sent + second.unwrap().sent, 4);
        assert_eq!(h.outbox.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_campaign_without_email_channel_is_rejected() {
        let h = harness().await;
        let campaign = Campaign::new("SMS push", vec![CampaignChannel::Sms], "agent-1").unwrap();
        let campaign = h.service.create_campaign(campaign).await.unwrap();

        let err = h.service.send_campaign_emails(campaign.id).await.unwrap_err();
        assert!(matches!(err, CampaignError::NoEmailChannel(_)));
    }

    #[tokio::test]
    async fn test_paused_campaign_does_not_send() {
        let h = harness().await;
        let campaign = email_campaign(&h, None).await;
        h.service.change_status(campaign.id, CampaignStatus::Running).await.unwrap();
        h.service.change_status(campaign.id, CampaignStatus::Paused).await.unwrap();

        let err = h.service.send_campaign_emails(campaign.id).await.unwrap_err();
        assert!(matches!(err, CampaignError::InvalidTransition { from: CampaignStatus::Paused, .. }));
    }

    #[tokio::test]
    async fn test_draft_template_is_not_sent() {
        let h = harness().await;
        let draft = EmailTemplate::new("Draft", "Hi", TemplateType::Marketing, "<p>Hi</p>").unwrap();
        let draft = h.service.create_template(draft).await.unwrap();
        let campaign = email_campaign(&h, Some(&draft)).await;

        let err = h.service.send_campaign_emails(campaign.id).await.unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_subject_line_overrides_template_subject() {
        let h = harness().await;
        add_contact(&h, "Asha Rao", Some("asha@example.com"), "POL-100", false).await;
        let template = reminder_template(&h).await;
        let mut campaign = Campaign::new("Override", vec![CampaignChannel::Email], "agent-1")
            .unwrap()
            .with_template(template.id);
        campaign.subject_line = Some("Last call, {{customer_name}}".into());
        let campaign = h.service.create_campaign(campaign).await.unwrap();
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();

        h.service.send_campaign_emails(campaign.id).await.unwrap();
        assert_eq!(h.outbox.lock().unwrap()[0].subject, "Last call, Asha Rao");
    }
}

// ============================================================================
// Recipient Tests
// ============================================================================

mod recipient_tests {
    use super::*;

    #[tokio::test]
    async fn test_recipients_are_added_once() {
        let h = harness().await;
        add_contact(&h, "Asha Rao", Some("asha@example.com"), "POL-100", true).await;
        add_contact(&h, "Ravi Kumar", Some("ravi@example.com"), "POL-101", false).await;
        let campaign = email_campaign(&h, None).await;

        let expired = h.service.add_recipients(campaign.id, Audience::ExpiredPolicies).await.unwrap();
        assert_eq!((expired.added, expired.total), (1, 1));

        let all = h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();
        assert_eq!((all.added, all.total), (1, 2));

        let again = h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();
        assert_eq!((again.added, again.total), (0, 2));
        assert_eq!(h.service.get_campaign(campaign.id).await.unwrap().target_count, 2);
    }

    #[tokio::test]
    async fn test_cancelled_campaign_takes_no_recipients() {
        let h = harness().await;
        let campaign = email_campaign(&h, None).await;
        h.service.change_status(campaign.id, CampaignStatus::Cancelled).await.unwrap();

        let err = h
            .service
            .add_recipients(campaign.id, Audience::AllCustomers)
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_campaign() {
        let h = harness().await;
        let err = h.service.recipients(CampaignId::new_v7()).await.unwrap_err();
        assert!(matches!(err, CampaignError::CampaignNotFound(_)));
    }
}

// ============================================================================
// Tracking Tests
// ============================================================================

mod tracking_tests {
    use super::*;

    async fn sent_campaign(h: &Harness) -> (CampaignId, String) {
        add_contact(h, "Asha Rao", Some("asha@example.com"), "POL-100", false).await;
        add_contact(h, "Ravi Kumar", Some("ravi@example.com"), "POL-101", false).await;
        let campaign = email_campaign(h, None).await;
        h.service.add_recipients(campaign.id, Audience::AllCustomers).await.unwrap();
        h.service.send_campaign_emails(campaign.id).await.unwrap();
        let tracking_id = h.service.recipients(campaign.id).await.unwrap()[0].tracking_id.clone();
        (campaign.id, tracking_id)
    }

    #[tokio::test]
    async fn test_click_counts_as_delivered_and_opened() {
        let h = harness().await;
        let (campaign_id, tracking_id) = sent_campaign(&h).await;

        h.service.track_click(&tracking_id).await.unwrap();

        let metrics = h.service.metrics(campaign_id).await.unwrap();
        assert_eq!(metrics.total_recipients, 2);
        assert_eq!(metrics.counts.sent_count, 2);
        assert_eq!(metrics.counts.delivered_count, 1);
        assert_eq!(metrics.counts.opened_count, 1);
        assert_eq!(metrics.counts.clicked_count, 1);
        assert_eq!(metrics.delivery_rate, 50.0);
        assert_eq!(metrics.click_rate, 100.0);

        let campaign = h.service.get_campaign(campaign_id).await.unwrap();
        assert_eq!(campaign.statistics.clicked_count, 1);
    }

    #[tokio::test]
    async fn test_open_after_click_keeps_click_engagement() {
        let h = harness().await;
        let (campaign_id, tracking_id) = sent_campaign(&h).await;

        h.service.track_click(&tracking_id).await.unwrap();
        h.service.track_open(&tracking_id).await.unwrap();

        let recipient = h
            .store
            .recipient_by_tracking_id(&tracking_id)
            .await
            .unwrap();
        assert_eq!(recipient.email_engagement, EngagementStatus::Clicked);
        assert_eq!(h.service.metrics(campaign_id).await.unwrap().counts.opened_count, 1);
    }

    #[tokio::test]
    async fn test_delivery_reports() {
        let h = harness().await;
        let (campaign_id, tracking_id) = sent_campaign(&h).await;

        h.service.record_delivery(&tracking_id, DeliveryEvent::Replied).await.unwrap();
        let metrics = h.service.metrics(campaign_id).await.unwrap();
        assert_eq!(metrics.counts.total_responses, 1);
        assert_eq!(metrics.response_rate, 100.0);

        let other = h.service.recipients(campaign_id).await.unwrap()[1].tracking_id.clone();
        h.service
            .record_delivery(&other, DeliveryEvent::Bounced { reason: Some("mailbox full".into()) })
            .await
            .unwrap();
        let bounced = h.store.recipient_by_tracking_id(&other).await.unwrap();
        assert_eq!(bounced.email_status, DeliveryStatus::Bounced);
        assert_eq!(bounced.email_error_message.as_deref(), Some("mailbox full"));
    }

    #[tokio::test]
    async fn test_unknown_tracking_id() {
        let h = harness().await;
        let err = h.service.track_open("does-not-exist").await.unwrap_err();
        assert!(matches!(err, CampaignError::UnknownTrackingId(_)));
    }
}

// ============================================================================
// Template Tests
// ============================================================================

mod template_tests {
    use super::*;

    #[tokio::test]
    async fn test_test_email_is_marked_and_counted() {
        let h = harness().await;
        let template = reminder_template(&h).await;
        let context = TemplateContext::new()
            .with("customer_name", "Asha Rao")
            .with("policy_number", "POL-100")
            .with("expiry_date", "2026-09-30");

        let outcome = h
            .service
            .send_test_email(template.id, "qa@insurer.test", &context)
            .await
            .unwrap();
        assert_eq!(outcome.provider_name, "Primary");

        let outbox = h.outbox.lock().unwrap().clone();
        assert_eq!(outbox[0].subject, "[TEST] Asha Rao, POL-100 expires 2026-09-30");
        assert_eq!(h.service.get_template(template.id).await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_preview_leaves_missing_values_visible() {
        let h = harness().await;
        let template = reminder_template(&h).await;
        let preview = h
            .service
            .preview_template(template.id, &TemplateContext::new().with("customer_name", "Asha"))
            .await
            .unwrap();
        assert_eq!(preview.subject, "Asha, {{policy_number}} expires {{expiry_date}}");
    }

    #[tokio::test]
    async fn test_campaign_with_missing_template_is_rejected() {
        let h = harness().await;
        let campaign = Campaign::new("Orphan", vec![CampaignChannel::Email], "agent-1")
            .unwrap()
            .with_template(
                EmailTemplate::new("Unsaved", "Hi", TemplateType::Custom, "<p>Hi</p>")
                    .unwrap()
                    .id,
            );
        let err = h.service.create_campaign(campaign).await.unwrap_err();
        assert!(matches!(err, CampaignError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_deleted_template_is_gone() {
        let h = harness().await;
        let template = reminder_template(&h).await;
        h.service.delete_template(template.id).await.unwrap();
        assert!(matches!(
            h.service.get_template(template.id).await.unwrap_err(),
            CampaignError::TemplateNotFound(_)
        ));
    }
}
