//! SMTP transport

use std::time::Duration;

use async_trait::async_trait;
use mail_builder::MessageBuilder;
use mail_send::SmtpClientBuilder;
use tracing::debug;
use uuid::Uuid;

use core_kernel::PortError;

use super::EmailTransport;
use crate::message::{OutgoingEmail, SendReceipt};
use crate::vault::ProviderCredentials;

/// Plain SMTP submission
///
/// `use_ssl` connects with implicit TLS (usually port 465); otherwise
/// `use_tls` upgrades with STARTTLS and neither sends in clear text.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
    username: String,
    password: String,
    use_tls: bool,
    use_ssl: bool,
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: String::new(),
            use_tls: true,
            use_ssl: false,
            timeout,
        }
    }

    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_security(mut self, use_tls: bool, use_ssl: bool) -> Self {
        self.use_tls = use_tls;
        self.use_ssl = use_ssl;
        self
    }

    pub fn from_credentials(credentials: &ProviderCredentials, timeout: Duration) -> Self {
        Self::new(credentials.smtp_host.clone(), credentials.smtp_port, timeout)
            .with_login(credentials.smtp_username.clone(), credentials.smtp_password.clone())
            .with_security(credentials.smtp_use_tls, credentials.smtp_use_ssl)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    #[cfg(test)]
    pub(crate) fn password(&self) -> Option<&str> {
        (!self.password.is_empty()).then_some(self.password.as_str())
    }

    fn client(&self) -> SmtpClientBuilder<String> {
        let builder = SmtpClientBuilder::new(self.host.clone(), self.port)
            .implicit_tls(self.use_ssl)
            .timeout(self.timeout);
        if self.username.is_empty() {
            builder
        } else {
            builder.credentials((self.username.clone(), self.password.clone()))
        }
    }

    fn smtp_error(&self, error: mail_send::Error) -> PortError {
        PortError::connection(format!("smtp {}:{}: {}", self.host, self.port, error))
    }
}

/// Builds the MIME message and a message id under the sender's domain
fn build_message(email: &OutgoingEmail) -> Result<(MessageBuilder<'_>, String), PortError> {
    let from = email
        .from_email
        .as_deref()
        .ok_or_else(|| PortError::validation_field("sender address is required", "from_email"))?;
    let domain = from.rsplit('@').next().unwrap_or("localhost");
    let message_id = format!("{}@{}", Uuid::now_v7().simple(), domain);

    let mut message = MessageBuilder::new()
        .message_id(message_id.clone())
        .to(email.to.iter().map(String::as_str).collect::<Vec<_>>())
        .subject(email.subject.as_str());

    message = match email.from_name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => message.from((name, from)),
        None => message.from(from),
    };
    if !email.cc.is_empty() {
        message = message.cc(email.cc.iter().map(String::as_str).collect::<Vec<_>>());
    }
    if !email.bcc.is_empty() {
        message = message.bcc(email.bcc.iter().map(String::as_str).collect::<Vec<_>>());
    }
    if let Some(reply_to) = email.reply_to.as_deref().filter(|r| !r.is_empty()) {
        message = message.reply_to(reply_to);
    }
    if let Some(text) = &email.text_body {
        message = message.text_body(text.as_str());
    }
    if let Some(html) = &email.html_body {
        message = message.html_body(html.as_str());
    }
    for attachment in &email.attachments {
        message = message.attachment(
            attachment.content_type.as_str(),
            attachment.filename.as_str(),
            attachment.content.as_slice(),
        );
    }

    Ok((message, message_id))
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, PortError> {
        let (message, message_id) = build_message(email)?;
        let builder = self.client();

        if self.use_ssl || self.use_tls {
            builder
                .connect()
                .await
                .map_err(|e| self.smtp_error(e))?
                .send(message)
                .await
                .map_err(|e| self.smtp_error(e))?;
        } else {
            builder
                .connect_plain()
                .await
                .map_err(|e| self.smtp_error(e))?
                .send(message)
                .await
                .map_err(|e| self.smtp_error(e))?;
        }

        debug!(host = %self.host, %message_id, "SMTP server accepted message");
        Ok(SendReceipt { message_id })
    }

    async fn health_check(&self) -> Result<(), PortError> {
        let builder = self.client();
        // connecting runs EHLO, TLS negotiation and AUTH
        if self.use_ssl || self.use_tls {
            builder.connect().await.map_err(|e| self.smtp_error(e))?;
        } else {
            builder.connect_plain().await.map_err(|e| self.smtp_error(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_uses_sender_domain() {
        let mut email = OutgoingEmail::new("customer@example.com", "Hello").text("Hi");
        email.from_email = Some("desk@insurer.test".into());
        let (_, message_id) = build_message(&email).unwrap();
        assert!(message_id.ends_with("@insurer.test"));
    }

    #[test]
    fn test_from_credentials() {
        let creds = ProviderCredentials {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 465,
            smtp_use_ssl: true,
            ..Default::default()
        };
        let transport = SmtpTransport::from_credentials(&creds, Duration::from_secs(5));
        assert_eq!(transport.host(), "smtp.example.com");
        assert!(transport.use_ssl);
    }
}
