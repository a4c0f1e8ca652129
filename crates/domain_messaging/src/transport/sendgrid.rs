//! SendGrid v3 Web API transport

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use tracing::debug;

use core_kernel::PortError;

use super::{request_error, status_error, EmailTransport};
use crate::message::{OutgoingEmail, SendReceipt};

pub const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<MailAddress<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<MailAddress<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<MailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct MailAttachment<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    disposition: &'static str,
}

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: MailAddress<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<MailAddress<'a>>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MailAttachment<'a>>,
}

fn addresses(list: &[String]) -> Vec<MailAddress<'_>> {
    list.iter()
        .map(|email| MailAddress { email, name: None })
        .collect()
}

/// Builds the `/v3/mail/send` request body
fn mail_send_body(email: &OutgoingEmail) -> Result<MailSend<'_>, PortError> {
    let from = email
        .from_email
        .as_deref()
        .ok_or_else(|| PortError::validation_field("sender address is required", "from_email"))?;

    // text/plain must precede text/html
    let mut content = Vec::new();
    if let Some(text) = &email.text_body {
        content.push(Content { kind: "text/plain", value: text });
    }
    if let Some(html) = &email.html_body {
        content.push(Content { kind: "text/html", value: html });
    }

    Ok(MailSend {
        personalizations: vec![Personalization {
            to: addresses(&email.to),
            cc: addresses(&email.cc),
            bcc: addresses(&email.bcc),
        }],
        from: MailAddress {
            email: from,
            name: email.from_name.as_deref().filter(|n| !n.is_empty()),
        },
        reply_to: email
            .reply_to
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(|r| MailAddress { email: r, name: None }),
        subject: &email.subject,
        content,
        attachments: email
            .attachments
            .iter()
            .map(|a| MailAttachment {
                content: BASE64.encode(&a.content),
                filename: &a.filename,
                kind: &a.content_type,
                disposition: "attachment",
            })
            .collect(),
    })
}

/// Sends through `POST /v3/mail/send`
pub struct SendGridTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SendGridTransport {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn error_from(response: reqwest::Response) -> PortError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();
        status_error(status, retry_after, &body)
    }
}

#[async_trait]
impl EmailTransport for SendGridTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, PortError> {
        let body = mail_send_body(email)?;
        let url = format!("{}/v3/mail/send", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("sendgrid mail/send", REQUEST_TIMEOUT, e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        debug!(%message_id, recipients = email.to.len(), "SendGrid accepted message");
        Ok(SendReceipt { message_id })
    }

    async fn health_check(&self) -> Result<(), PortError> {
        let url = format!("{}/v3/user/profile", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| request_error("sendgrid user/profile", REQUEST_TIMEOUT, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}
