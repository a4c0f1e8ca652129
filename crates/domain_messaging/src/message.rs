//! Outgoing messages

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::MessagingError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// A message to deliver; unset sender fields fall back to the provider's
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    pub fn validate(&self) -> Result<(), MessagingError> {
        if self.to.is_empty() {
            return Err(MessagingError::InvalidEmail("at least one recipient is required".into()));
        }
        if let Some(bad) = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .find(|addr| !addr.validate_email())
        {
            return Err(MessagingError::InvalidEmail(format!("invalid address: {}", bad)));
        }
        if self.subject.trim().is_empty() {
            return Err(MessagingError::InvalidEmail("subject is required".into()));
        }
        if self.html_body.is_none() && self.text_body.is_none() {
            return Err(MessagingError::InvalidEmail("html or text body is required".into()));
        }
        Ok(())
    }

    /// Every envelope recipient
    pub fn recipients(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}

/// What a transport reports for an accepted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_body() {
        let email = OutgoingEmail::new("a@example.com", "Renewal due");
        assert!(email.validate().is_err());
        assert!(email.text("Your policy renews soon").validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_address() {
        let mut email = OutgoingEmail::new("a@example.com", "Hi").text("x");
        email.cc.push("not-an-address".into());
        assert!(matches!(email.validate(), Err(MessagingError::InvalidEmail(_))));
    }

    #[test]
    fn test_attachment_content_is_base64_on_the_wire() {
        let attachment = Attachment {
            filename: "schedule.txt".into(),
            content_type: "text/plain".into(),
            content: b"hello".to_vec(),
        };
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["content"], "aGVsbG8=");
    }
}
