//! Core Kernel - Foundational types for the renewal management system
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Strongly-typed identifiers for customers, policies, renewal cases and the rest
//! - The kernel error type
//! - Port infrastructure (port errors, health checks) for swappable adapters
//! - Pagination primitives used by list operations

pub mod identifiers;
pub mod error;
pub mod ports;
pub mod pagination;
pub mod enums;

pub use identifiers::{
    CustomerId, PolicyId, PolicyTypeId, ClaimId, RenewalCaseId, PaymentId,
    InstallmentId, CommunicationLogId, ProviderId, HierarchyUnitId, InsightId,
    CampaignId, CampaignRecipientId, EmailTemplateId,
};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable,
};
pub use pagination::{Page, PageRequest};
