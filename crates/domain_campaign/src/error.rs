//! Campaign domain errors

use thiserror::Error;

use core_kernel::PortError;
use domain_messaging::MessagingError;

use crate::campaign::CampaignStatus;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Email template not found: {0}")]
    TemplateNotFound(String),

    /// No recipient carries the tracking id
    #[error("Unknown tracking id: {0}")]
    UnknownTrackingId(String),

    #[error("Campaign {0} does not include the email channel")]
    NoEmailChannel(String),

    #[error("Cannot move campaign from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Store(#[from] PortError),
}
