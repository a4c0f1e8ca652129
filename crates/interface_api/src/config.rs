//! API configuration
//!
//! Values come from `APP_`-prefixed environment variables (a `.env` file is
//! honoured by the server binary), falling back to local development
//! defaults. `APP_JWT_SECRET`, `APP_DATABASE_URL` and `APP_ENCRYPTION_KEY`
//! must be overridden outside development.

use std::time::Duration;

use serde::Deserialize;

use domain_campaign::CampaignSettings;

/// Base64 of a 32 byte development key; never use outside local setups
pub const DEV_ENCRYPTION_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    pub log_format: LogFormat,
    /// Base64-encoded AES-256 key for provider secrets
    pub encryption_key: String,
    /// Age after which cached insights are recomputed
    pub insight_cache_ttl_secs: u64,
    /// Lifetime of decrypted provider credentials
    pub credential_cache_ttl_secs: u64,
    /// Timeout for outbound provider calls
    pub provider_timeout_secs: u64,
    /// Public address of this API, used in campaign tracking and renewal links
    pub public_base_url: String,
    /// Sender name shown in campaign email
    pub company_name: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/renewals".to_string(),
            database_max_connections: 10,
            database_min_connections: 2,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            encryption_key: DEV_ENCRYPTION_KEY.to_string(),
            insight_cache_ttl_secs: 3600,
            credential_cache_ttl_secs: 3600,
            provider_timeout_secs: 30,
            public_base_url: "http://localhost:8080".to_string(),
            company_name: "Renewals Team".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `APP_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::Environment::with_prefix("APP"))
            .build()?
            .try_deserialize()
    }

    /// A builder seeded with [`ApiConfig::default`]
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let d = Self::default();
        config::Config::builder()
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("jwt_secret", d.jwt_secret)?
            .set_default("jwt_expiration_secs", d.jwt_expiration_secs)?
            .set_default("database_url", d.database_url)?
            .set_default("database_max_connections", i64::from(d.database_max_connections))?
            .set_default("database_min_connections", i64::from(d.database_min_connections))?
            .set_default("log_level", d.log_level)?
            .set_default("log_format", "pretty")?
            .set_default("encryption_key", d.encryption_key)?
            .set_default("insight_cache_ttl_secs", d.insight_cache_ttl_secs)?
            .set_default("credential_cache_ttl_secs", d.credential_cache_ttl_secs)?
            .set_default("provider_timeout_secs", d.provider_timeout_secs)?
            .set_default("public_base_url", d.public_base_url)?
            .set_default("company_name", d.company_name)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn insight_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.insight_cache_ttl_secs as i64)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_cache_ttl_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn campaign_settings(&self) -> CampaignSettings {
        CampaignSettings {
            public_base_url: self.public_base_url.clone(),
            company_name: self.company_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let config: ApiConfig = ApiConfig::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let expected = ApiConfig::default();
        assert_eq!(config.port, expected.port);
        assert_eq!(config.database_url, expected.database_url);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.encryption_key, DEV_ENCRYPTION_KEY);
        assert_eq!(config.public_base_url, expected.public_base_url);
    }

    #[test]
    fn test_overrides_apply() {
        let config: ApiConfig = ApiConfig::builder()
            .unwrap()
            .set_override("port", 9090)
            .unwrap()
            .set_override("log_format", "json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.server_addr(), "0.0.0.0:9090");
    }
}
