//! Delivery transports
//!
//! Each provider type has an [`EmailTransport`]. Transport failures are
//! reported as [`PortError`] so the service can tell transient failures
//! from configuration problems:
//!
//! - 401/403 -> `PortError::Unauthorized`
//! - 404 -> `PortError::NotFound`
//! - 429 -> `PortError::RateLimited`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - Timeouts -> `PortError::Timeout`
//! - Other -> `PortError::Validation` / `PortError::Connection`

pub mod sendgrid;
pub mod smtp;
pub mod ses;

use std::time::Duration;

use async_trait::async_trait;

use core_kernel::PortError;

use crate::error::MessagingError;
use crate::message::{OutgoingEmail, SendReceipt};
use crate::provider::{EmailProviderConfig, ProviderType};
use crate::vault::ProviderCredentials;

pub use sendgrid::SendGridTransport;
pub use smtp::SmtpTransport;
pub use ses::SesTransport;

/// Delivers messages through one provider
///
/// `send` receives a message whose sender fields are already resolved.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, PortError>;

    /// Verifies connectivity and credentials without sending
    async fn health_check(&self) -> Result<(), PortError>;
}

/// Builds the transport for a provider
pub trait TransportFactory: Send + Sync {
    fn build(
        &self,
        provider: &EmailProviderConfig,
        credentials: ProviderCredentials,
    ) -> Result<Box<dyn EmailTransport>, MessagingError>;
}

/// Production transports
#[derive(Debug, Clone)]
pub struct DefaultTransportFactory {
    http: reqwest::Client,
    timeout: Duration,
    sendgrid_base_url: String,
}

impl DefaultTransportFactory {
    pub fn new(timeout: Duration) -> Result<Self, MessagingError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("renewal-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MessagingError::Configuration(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            http,
            timeout,
            sendgrid_base_url: sendgrid::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points SendGrid calls at another host
    pub fn with_sendgrid_base_url(mut self, url: impl Into<String>) -> Self {
        self.sendgrid_base_url = url.into();
        self
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn build(
        &self,
        provider: &EmailProviderConfig,
        credentials: ProviderCredentials,
    ) -> Result<Box<dyn EmailTransport>, MessagingError> {
        match provider.provider_type {
            ProviderType::Sendgrid => {
                if credentials.api_key.is_empty() {
                    return Err(MessagingError::Credentials(format!(
                        "{} has no SendGrid API key",
                        provider.name
                    )));
                }
                Ok(Box::new(SendGridTransport::new(
                    self.http.clone(),
                    &self.sendgrid_base_url,
                    credentials.api_key,
                )))
            }
            ProviderType::Smtp => {
                if credentials.smtp_host.is_empty() {
                    return Err(MessagingError::Configuration(format!(
                        "{} has no SMTP host",
                        provider.name
                    )));
                }
                Ok(Box::new(SmtpTransport::from_credentials(&credentials, self.timeout)))
            }
            ProviderType::AwsSes => {
                if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
                    return Err(MessagingError::Credentials(format!(
                        "{} has no SES access keys",
                        provider.name
                    )));
                }
                Ok(Box::new(SesTransport::from_credentials(&credentials, self.timeout)?))
            }
        }
    }
}

/// Maps an HTTP error status to a port error
pub(crate) fn status_error(
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> PortError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.chars().take(300).collect::<String>())
    };
    match status.as_u16() {
        401 | 403 => PortError::Unauthorized { message: detail },
        404 => PortError::not_found("endpoint", detail),
        429 => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        500..=599 => PortError::ServiceUnavailable { service: detail },
        _ => PortError::validation(detail),
    }
}

pub(crate) fn request_error(operation: &str, timeout: Duration, error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout.as_millis() as u64,
        }
    } else {
        PortError::connection(format!("{}: {}", operation, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, ""),
            PortError::Unauthorized { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(5), ""),
            PortError::RateLimited { retry_after_secs: 5 }
        ));
        let unavailable = status_error(StatusCode::BAD_GATEWAY, None, "upstream");
        assert!(unavailable.is_transient());
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, None, "bad from"),
            PortError::Validation { .. }
        ));
    }

    #[test]
    fn test_factory_rejects_missing_credentials() {
        let factory = DefaultTransportFactory::new(Duration::from_secs(5)).unwrap();
        let provider = EmailProviderConfig::new("SG", ProviderType::Sendgrid, "a@example.com");
        let result = factory.build(&provider, ProviderCredentials::default());
        assert!(matches!(result, Err(MessagingError::Credentials(_))));

        let smtp = EmailProviderConfig::new("Relay", ProviderType::Smtp, "a@example.com");
        assert!(matches!(
            factory.build(&smtp, ProviderCredentials::default()),
            Err(MessagingError::Configuration(_))
        ));
    }
}
