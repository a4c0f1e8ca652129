//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the renewal system using SQLx.
//!
//! # Layout
//!
//! - [`pool`]: connection pool configuration and migrations
//! - [`repositories`]: one repository per table family, returning domain types
//! - [`adapters`]: implementations of the messaging, campaign and insight ports
//!
//! Enumerations are stored as their lowercase text form and checked by
//! table constraints; counts are stored as INTEGER.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, run_migrations, CustomerRepository};
//!
//! let pool = create_pool_from_url("postgres://localhost/renewals").await?;
//! run_migrations(&pool).await?;
//! let customers = CustomerRepository::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, create_lazy_pool, create_pool_from_url, run_migrations, ping};
pub use error::DatabaseError;
pub use repositories::{
    CustomerRepository, CustomerFilter, CommunicationRepository, CommunicationFilter,
    PolicyRepository, PolicyFilter, ClaimRepository, ClaimFilter, RenewalRepository, CaseFilter,
    PaymentRepository, PaymentFilter, HierarchyRepository, HierarchyFilter,
};
pub use adapters::{PostgresProviderStore, PostgresCampaignStore, PostgresInsightSource, PostgresInsightStore};
