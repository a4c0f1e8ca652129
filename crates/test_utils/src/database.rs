//! Database Test Utilities
//!
//! Starts PostgreSQL in a test container and applies the `infra_db`
//! migrations, so repository tests run against the real schema.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use tokio::sync::OnceCell;

const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "renewals_test";

/// Child tables first so truncation order never trips a foreign key
const TABLES: &[&str] = &[
    "campaign_recipients",
    "campaigns",
    "email_templates",
    "customer_insights",
    "email_provider_test_results",
    "email_provider_usage_logs",
    "email_provider_health_logs",
    "email_providers",
    "installments",
    "customer_payments",
    "renewal_cases",
    "policy_claims",
    "policies",
    "policy_types",
    "communication_logs",
    "customers",
    "hierarchy_units",
];

static TRUNCATE_ALL: Lazy<String> = Lazy::new(|| format!("TRUNCATE TABLE {} CASCADE", TABLES.join(", ")));

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated PostgreSQL test container
///
/// The container stops when this value is dropped.
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a container and applies every migration
    ///
    /// # Errors
    ///
    /// Returns an error if Docker is unavailable, the container fails to
    /// start, or a migration fails
    pub async fn new() -> TestResult<Self> {
        let container = Postgres::default()
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_db_name(POSTGRES_DB)
            .with_tag(POSTGRES_TAG)
            .start()
            .await?;

        let config = TestDatabaseConfig {
            host: container.get_host().await?.to_string(),
            port: container.get_host_port_ipv4(5432).await?,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data while keeping the schema
    pub async fn clear_data(&self) -> TestResult<()> {
        sqlx::query(TRUNCATE_ALL.as_str()).execute(&self.pool).await?;
        Ok(())
    }
}

static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// A database shared by every test in the process
///
/// # Panics
///
/// Panics if the container cannot be started
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// A database of its own for a test that needs isolation
pub async fn create_isolated_test_database() -> TestResult<TestDatabase> {
    TestDatabase::new().await
}

/// Declares a tokio test that gets an isolated, migrated database
///
/// These need a Docker daemon and are ignored by default; run them with
/// `--ignored`.
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$pool:ident| $body:block) => {
        #[tokio::test]
        #[ignore = "requires a Docker daemon"]
        async fn $name() {
            let db = $crate::database::create_isolated_test_database()
                .await
                .expect("Failed to create test database");
            let $pool = db.pool().clone();
            $body
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let url = TestDatabaseConfig::default().connection_url();
        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.ends_with(POSTGRES_DB));
    }

    #[test]
    fn test_truncate_covers_every_table() {
        let schema = [
            include_str!("../../infra_db/migrations/0001_init.sql"),
            include_str!("../../infra_db/migrations/0002_campaigns.sql"),
        ]
        .concat();
        let created = schema.matches("CREATE TABLE ").count();
        assert_eq!(created, TABLES.len());
        for table in TABLES {
            assert!(schema.contains(&format!("CREATE TABLE {} (", table)), "{}", table);
        }
    }
}
