//! Provider credential encryption and caching
//!
//! Secret provider fields are encrypted with AES-256-GCM under a key from
//! configuration. The stored form is `base64(nonce || ciphertext)` with a
//! 12 byte random nonce per value.
//!
//! Decrypted credentials are cached per provider for a configurable TTL and
//! must be invalidated whenever the provider is updated or deleted.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use core_kernel::ProviderId;

use crate::error::MessagingError;
use crate::provider::{EmailProviderConfig, ProviderSecrets};

const NONCE_SIZE: usize = 12;

/// Default lifetime of cached credentials
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(3600);

/// Encrypts and decrypts provider secrets
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialVault { .. }")
    }
}

impl CredentialVault {
    /// Builds a vault from a base64-encoded 32 byte key
    pub fn from_base64_key(key: &str) -> Result<Self, MessagingError> {
        let bytes = BASE64
            .decode(key.trim())
            .map_err(|e| MessagingError::Configuration(format!("encryption key is not base64: {}", e)))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|_| {
            MessagingError::Configuration(format!(
                "encryption key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Encrypts a value; empty input stays empty
    pub fn encrypt(&self, plaintext: &str) -> Result<String, MessagingError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| MessagingError::Credentials(format!("encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, MessagingError> {
        if encrypted.is_empty() {
            return Ok(String::new());
        }
        let combined = BASE64
            .decode(encrypted)
            .map_err(|e| MessagingError::Credentials(format!("invalid base64: {}", e)))?;
        if combined.len() < NONCE_SIZE {
            return Err(MessagingError::Credentials(format!(
                "encrypted value too short: {} bytes",
                combined.len()
            )));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| MessagingError::Credentials("decryption failed".into()))?;
        String::from_utf8(plaintext)
            .map_err(|e| MessagingError::Credentials(format!("decrypted value is not UTF-8: {}", e)))
    }

    /// Encrypts every non-empty plaintext secret
    pub fn seal(&self, plain: &ProviderSecrets) -> Result<ProviderSecrets, MessagingError> {
        Ok(ProviderSecrets {
            api_key: self.encrypt(&plain.api_key)?,
            api_secret: self.encrypt(&plain.api_secret)?,
            access_key_id: self.encrypt(&plain.access_key_id)?,
            secret_access_key: self.encrypt(&plain.secret_access_key)?,
            smtp_password: self.encrypt(&plain.smtp_password)?,
        })
    }

    /// Decrypts one field, degrading to empty on failure
    fn open_field(&self, provider: &EmailProviderConfig, field: &str, value: &str) -> String {
        match self.decrypt(value) {
            Ok(plain) => plain,
            Err(e) => {
                warn!(provider = %provider.name, field, error = %e, "Failed to decrypt provider secret");
                String::new()
            }
        }
    }

    /// Resolves the full credential set for a provider
    pub fn credentials_for(&self, provider: &EmailProviderConfig) -> ProviderCredentials {
        let s = &provider.secrets;
        ProviderCredentials {
            api_key: self.open_field(provider, "api_key", &s.api_key),
            api_secret: self.open_field(provider, "api_secret", &s.api_secret),
            access_key_id: self.open_field(provider, "access_key_id", &s.access_key_id),
            secret_access_key: self.open_field(provider, "secret_access_key", &s.secret_access_key),
            region: provider.region.clone().unwrap_or_else(|| "us-east-1".to_string()),
            smtp_host: provider.smtp_host.clone().unwrap_or_default(),
            smtp_port: provider.smtp_port,
            smtp_username: provider.smtp_username.clone().unwrap_or_default(),
            smtp_password: self.open_field(provider, "smtp_password", &s.smtp_password),
            smtp_use_tls: provider.smtp_use_tls,
            smtp_use_ssl: provider.smtp_use_ssl,
            from_email: provider.from_email.clone(),
            from_name: provider.from_name.clone(),
            reply_to: provider.reply_to.clone(),
        }
    }
}

/// Decrypted connection settings for one provider
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub smtp_use_ssl: bool,
    pub from_email: String,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("region", &self.region)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}

/// TTL cache of decrypted credentials keyed by provider
#[derive(Debug)]
pub struct CredentialCache {
    ttl: Duration,
    entries: RwLock<HashMap<ProviderId, (Instant, ProviderCredentials)>>,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, provider_id: ProviderId) -> Option<ProviderCredentials> {
        let entries = self.entries.read().await;
        entries
            .get(&provider_id)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, creds)| creds.clone())
    }

    pub async fn put(&self, provider_id: ProviderId, credentials: ProviderCredentials) {
        self.entries
            .write()
            .await
            .insert(provider_id, (Instant::now(), credentials));
    }

    pub async fn invalidate(&self, provider_id: ProviderId) {
        if self.entries.write().await.remove(&provider_id).is_some() {
            debug!(%provider_id, "Invalidated cached provider credentials");
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderType;

    fn vault() -> CredentialVault {
        CredentialVault::from_base64_key(&BASE64.encode([7u8; 32])).unwrap()
    }

    #[test]
    fn test_encrypt_is_randomised_and_reversible() {
        let v = vault();
        let a = v.encrypt("SG.secret").unwrap();
        let b = v.encrypt("SG.secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(v.decrypt(&a).unwrap(), "SG.secret");
    }

    #[test]
    fn test_wrong_key_length() {
        let err = CredentialVault::from_base64_key(&BASE64.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, MessagingError::Configuration(_)));
    }

    #[test]
    fn test_corrupt_secret_degrades_to_empty() {
        let v = vault();
        let mut provider = EmailProviderConfig::new("Relay", ProviderType::Smtp, "ops@example.com");
        provider.secrets.smtp_password = "bm90IGVuY3J5cHRlZA==".into();
        provider.secrets.api_key = v.encrypt("key").unwrap();

        let creds = v.credentials_for(&provider);
        assert_eq!(creds.smtp_password, "");
        assert_eq!(creds.api_key, "key");
        assert_eq!(creds.region, "us-east-1");
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = ProviderCredentials {
            api_key: "SG.very-secret".into(),
            ..Default::default()
        };
        assert!(!format!("{:?}", creds).contains("very-secret"));
    }

    #[tokio::test]
    async fn test_cache_expiry_and_invalidation() {
        let cache = CredentialCache::new(Duration::from_millis(30));
        let id = ProviderId::new();
        cache.put(id, ProviderCredentials::default()).await;
        assert!(cache.get(id).await.is_some());

        cache.invalidate(id).await;
        assert!(cache.get(id).await.is_none());

        cache.put(id, ProviderCredentials::default()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get(id).await.is_none());
    }
}
