//! AWS SES transport over the SES SMTP interface
//!
//! Messages are submitted to `email-smtp.<region>.amazonaws.com:587` with
//! STARTTLS. The provider stores IAM credentials: `access_key_id` is the
//! SMTP user name and the SMTP password is derived from `secret_access_key`
//! for the provider's region. A non-empty `smtp_password` is taken as an
//! already-derived password and used as is.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use core_kernel::PortError;

use super::{EmailTransport, SmtpTransport};
use crate::error::MessagingError;
use crate::message::{OutgoingEmail, SendReceipt};
use crate::vault::ProviderCredentials;

pub const SES_SMTP_PORT: u16 = 587;

const SMTP_PASSWORD_VERSION: u8 = 0x04;

pub fn ses_smtp_host(region: &str) -> String {
    format!("email-smtp.{}.amazonaws.com", region)
}

fn hmac_sha256(key: &[u8], message: &str) -> Result<Vec<u8>, MessagingError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| MessagingError::Credentials(format!("SES key derivation failed: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Converts an IAM secret access key into the SES SMTP password for `region`
///
/// The key is signed through the fixed SigV4 scope
/// `11111111/<region>/ses/aws4_request` over `SendRawEmail`, then prefixed
/// with the version byte and base64 encoded.
pub fn smtp_password_from_secret(secret_access_key: &str, region: &str) -> Result<String, MessagingError> {
    let mut signature = hmac_sha256(format!("AWS4{}", secret_access_key).as_bytes(), "11111111")?;
    for part in [region, "ses", "aws4_request", "SendRawEmail"] {
        signature = hmac_sha256(&signature, part)?;
    }
    let mut versioned = Vec::with_capacity(signature.len() + 1);
    versioned.push(SMTP_PASSWORD_VERSION);
    versioned.extend_from_slice(&signature);
    Ok(BASE64.encode(versioned))
}

#[derive(Debug, Clone)]
pub struct SesTransport {
    region: String,
    inner: SmtpTransport,
}

impl SesTransport {
    pub fn from_credentials(credentials: &ProviderCredentials, timeout: Duration) -> Result<Self, MessagingError> {
        let region = if credentials.region.is_empty() {
            "us-east-1".to_string()
        } else {
            credentials.region.clone()
        };
        // an explicit SMTP host overrides the regional endpoint (VPC endpoints)
        let host = if credentials.smtp_host.is_empty() {
            ses_smtp_host(&region)
        } else {
            credentials.smtp_host.clone()
        };
        let password = if credentials.smtp_password.is_empty() {
            smtp_password_from_secret(&credentials.secret_access_key, &region)?
        } else {
            credentials.smtp_password.clone()
        };
        let inner = SmtpTransport::new(host, SES_SMTP_PORT, timeout)
            .with_login(credentials.access_key_id.clone(), password)
            .with_security(true, false);
        Ok(Self { region, inner })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn host(&self) -> &str {
        self.inner.host()
    }
}

#[async_trait]
impl EmailTransport for SesTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, PortError> {
        self.inner.send(email).await
    }

    async fn health_check(&self) -> Result<(), PortError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_endpoint() {
        let creds = ProviderCredentials {
            region: "ap-south-1".into(),
            access_key_id: "AKIA".into(),
            secret_access_key: "smtp-pass".into(),
            ..Default::default()
        };
        let transport = SesTransport::from_credentials(&creds, Duration::from_secs(5)).unwrap();
        assert_eq!(transport.host(), "email-smtp.ap-south-1.amazonaws.com");
        assert_eq!(transport.region(), "ap-south-1");
        let derived = smtp_password_from_secret("smtp-pass", "ap-south-1").unwrap();
        assert_eq!(transport.inner.password(), Some(derived.as_str()));
    }

    #[test]
    fn test_smtp_password_derivation() {
        let secret = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";
        assert_eq!(
            smtp_password_from_secret(secret, "us-east-1").unwrap(),
            "BLBM/9hSUELfq8Gw+rU1YcBjkOxGbhT2XG763xVLGWL9"
        );
        assert_eq!(
            smtp_password_from_secret(secret, "eu-west-1").unwrap(),
            "BMW5RDrXmmVs0lV7GpI4oLkHXpZ4stDsk6q91z1g38Pk"
        );
    }

    #[test]
    fn test_stored_smtp_password_is_used_as_is() {
        let creds = ProviderCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "ignored".into(),
            smtp_password: "BAlreadyDerived".into(),
            ..Default::default()
        };
        let transport = SesTransport::from_credentials(&creds, Duration::from_secs(5)).unwrap();
        assert_eq!(transport.inner.password(), Some("BAlreadyDerived"));
    }

    #[test]
    fn test_derived_password_is_versioned() {
        let decoded = BASE64.decode(smtp_password_from_secret("secret", "ap-south-1").unwrap()).unwrap();
        assert_eq!(decoded.len(), 33);
        assert_eq!(decoded[0], SMTP_PASSWORD_VERSION);
    }

    #[test]
    fn test_default_region() {
        let transport = SesTransport::from_credentials(&ProviderCredentials::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(transport.region(), "us-east-1");
    }
}
