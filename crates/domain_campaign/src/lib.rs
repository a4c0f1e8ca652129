//! Campaign Domain
//!
//! Outreach campaigns send a rendered email template to a selected audience
//! of customers and track what happens next: delivery, opens, clicks and
//! replies. Email goes out through [`domain_messaging::EmailProviderService`],
//! so provider failover and sending limits apply to every campaign message.
//!
//! # Components
//!
//! - [`template`]: email templates with `{{placeholder}}` rendering
//! - [`campaign`]: campaigns, channels, audiences and the status lifecycle
//! - [`recipient`]: per-customer delivery and engagement state
//! - [`statistics`]: counters and rates derived from recipients
//! - [`tracking`]: open pixel and click redirect rewriting
//! - [`store`]: the [`CampaignStore`] persistence port
//! - [`service`]: [`CampaignService`], sending and tracking

pub mod template;
pub mod campaign;
pub mod recipient;
pub mod statistics;
pub mod tracking;
pub mod store;
pub mod service;
pub mod error;

pub use template::{EmailTemplate, TemplateType, TemplateStatus, TemplateContext, RenderedEmail};
pub use campaign::{Campaign, CampaignStatus, CampaignChannel, Audience};
pub use recipient::{CampaignRecipient, DeliveryStatus, EngagementStatus};
pub use statistics::{CampaignStatistics, CampaignMetrics};
pub use tracking::TRACKING_PIXEL_GIF;
pub use store::{CampaignStore, TemplateFilter, AudienceMember, RecipientContact, PendingDelivery};
pub use service::{CampaignService, CampaignSettings, SendSummary, RecipientsAdded, DeliveryEvent};
pub use error::CampaignError;
