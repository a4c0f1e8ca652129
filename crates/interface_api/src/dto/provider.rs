//! Email provider DTOs
//!
//! Secrets arrive in plaintext and are sealed by the provider service before
//! storage; responses never carry them.

use serde::Deserialize;
use validator::Validate;

use core_kernel::ProviderId;
use domain_messaging::{ProviderSecrets, ProviderType};

/// Default and maximum number of log rows returned
pub const DEFAULT_LOG_LIMIT: u32 = 100;
pub const MAX_LOG_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct SecretFields {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub smtp_password: String,
}

impl SecretFields {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty()
            && self.api_secret.is_empty()
            && self.access_key_id.is_empty()
            && self.secret_access_key.is_empty()
            && self.smtp_password.is_empty()
    }

    pub fn into_secrets(self) -> ProviderSecrets {
        ProviderSecrets {
            api_key: self.api_key,
            api_secret: self.api_secret,
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            smtp_password: self.smtp_password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub provider_type: ProviderType,
    #[validate(email)]
    pub from_email: String,
    #[validate(length(max = 200))]
    pub from_name: Option<String>,
    #[validate(email)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub is_active: Option<bool>,
    #[validate(range(min = 1, max = 100))]
    pub priority: Option<u32>,
    pub region: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_use_tls: Option<bool>,
    pub smtp_use_ssl: Option<bool>,
    #[validate(range(min = 1))]
    pub daily_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub monthly_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub rate_limit_per_minute: Option<u32>,
    pub additional_settings: Option<serde_json::Value>,
    #[serde(flatten)]
    pub secrets: SecretFields,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProviderRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub from_email: Option<String>,
    #[validate(length(max = 200))]
    pub from_name: Option<String>,
    #[validate(email)]
    pub reply_to: Option<String>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
    #[validate(range(min = 1, max = 100))]
    pub priority: Option<u32>,
    pub region: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_use_tls: Option<bool>,
    pub smtp_use_ssl: Option<bool>,
    #[validate(range(min = 1))]
    pub daily_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub monthly_limit: Option<u32>,
    #[validate(range(min = 1))]
    pub rate_limit_per_minute: Option<u32>,
    pub additional_settings: Option<serde_json::Value>,
    /// Non-empty fields replace the stored secrets
    #[serde(flatten)]
    pub secrets: SecretFields,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TestProviderRequest {
    /// Sends a test message here; without it only the connection is checked
    #[validate(email)]
    pub test_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub provider_id: Option<ProviderId>,
    pub limit: Option<u32>,
}

impl LogQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
    }
}
