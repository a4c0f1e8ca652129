//! Domain port adapters
//!
//! PostgreSQL implementations of the ports declared by `domain_messaging`,
//! `domain_campaign` and `domain_insights`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::adapters::PostgresProviderStore;
//! use domain_messaging::ProviderStore;
//!
//! let store: Arc<dyn ProviderStore> = Arc::new(PostgresProviderStore::new(pool));
//! let providers = store.list_active().await?;
//! ```

pub mod provider;
pub mod campaign;
pub mod insight;

pub use provider::PostgresProviderStore;
pub use campaign::PostgresCampaignStore;
pub use insight::{PostgresInsightSource, PostgresInsightStore};
