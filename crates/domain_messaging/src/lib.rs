//! Email Provider Domain
//!
//! Outbound email goes through one of several configured providers
//! (SendGrid, AWS SES, plain SMTP). Providers are tried in priority order;
//! one that is inactive, unhealthy or over its sending limits is skipped,
//! and a provider that fails is marked unhealthy before the next one is
//! tried.
//!
//! # Components
//!
//! - [`provider`]: provider configuration, limits, health and usage counters
//! - [`vault`]: AES-256-GCM encryption of provider secrets and a TTL cache
//!   of decrypted credentials
//! - [`transport`]: the [`EmailTransport`] trait and its SendGrid, SMTP and
//!   SES implementations
//! - [`store`]: the [`ProviderStore`] persistence port
//! - [`service`]: [`EmailProviderService`], failover delivery, health checks
//!   and provider tests

pub mod provider;
pub mod logs;
pub mod message;
pub mod vault;
pub mod transport;
pub mod store;
pub mod service;
pub mod error;

pub use provider::{EmailProviderConfig, ProviderType, BlockReason, ProviderSecrets};
pub use logs::{
    ProviderHealthLog, HealthTestType, ProviderUsageLog, ProviderTestResult, TestType, TestStatus,
};
pub use message::{OutgoingEmail, Attachment, SendReceipt};
pub use vault::{CredentialVault, CredentialCache, ProviderCredentials};
pub use transport::{EmailTransport, TransportFactory, DefaultTransportFactory};
pub use store::{ProviderStore, Reservation};
pub use service::{EmailProviderService, SendOutcome, ProviderStatistics};
pub use error::MessagingError;
