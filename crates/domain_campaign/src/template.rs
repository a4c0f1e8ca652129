//! Reusable email templates
//!
//! Placeholders are written `{{name}}`, with optional spaces inside the
//! braces. Rendering substitutes the names present in the context and
//! leaves every other placeholder untouched, so a preview shows which
//! values are still missing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, EmailTemplateId};

use crate::error::CampaignError;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Welcome,
    RenewalReminder,
    PaymentConfirmation,
    PolicyUpdate,
    Marketing,
    Notification,
    Custom,
}

string_enum!(TemplateType, "template type", {
    Welcome => "welcome",
    RenewalReminder => "renewal_reminder",
    PaymentConfirmation => "payment_confirmation",
    PolicyUpdate => "policy_update",
    Marketing => "marketing",
    Notification => "notification",
    Custom => "custom",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

string_enum!(TemplateStatus, "template status", {
    Draft => "draft",
    Active => "active",
    Inactive => "inactive",
    Archived => "archived",
});

/// Values substituted into a template, keyed by placeholder name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateContext(BTreeMap<String, String>);

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Adds every entry of `other`, overwriting existing keys
    pub fn extend(&mut self, other: TemplateContext) {
        self.0.extend(other.0);
    }
}

impl FromIterator<(String, String)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Substitutes known placeholders in `text`
pub fn render_text(text: &str, context: &TemplateContext) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names used in `text`, in order of first appearance
pub fn placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// A rendered subject and bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    pub name: String,
    pub subject: String,
    pub template_type: TemplateType,
    pub status: TemplateStatus,
    pub html_content: String,
    /// Plain text body; derived from the HTML when empty
    pub text_content: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub usage_count: u32,
    pub last_used: Option<DateTime<Utc>>,
    pub is_default: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    pub fn new(
        name: impl Into<String>,
        subject: impl Into<String>,
        template_type: TemplateType,
        html_content: impl Into<String>,
    ) -> Result<Self, CampaignError> {
        let now = Utc::now();
        let template = Self {
            id: EmailTemplateId::new_v7(),
            name: name.into(),
            subject: subject.into(),
            template_type,
            status: TemplateStatus::Draft,
            html_content: html_content.into(),
            text_content: String::new(),
            description: None,
            tags: Vec::new(),
            usage_count: 0,
            last_used: None,
            is_default: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        template.validate()?;
        Ok(template)
    }

    /// Name, subject and HTML content must be present
    pub fn validate(&self) -> Result<(), CampaignError> {
        if self.name.trim().is_empty() {
            return Err(CampaignError::Validation("template name is required".into()));
        }
        if self.subject.trim().is_empty() {
            return Err(CampaignError::Validation("template subject is required".into()));
        }
        if self.html_content.trim().is_empty() {
            return Err(CampaignError::Validation("template content is required".into()));
        }
        Ok(())
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = text.into();
        self
    }

    pub fn activate(mut self) -> Self {
        self.status = TemplateStatus::Active;
        self
    }

    pub fn render(&self, context: &TemplateContext) -> RenderedEmail {
        RenderedEmail {
            subject: render_text(&self.subject, context),
            html_content: render_text(&self.html_content, context),
            text_content: render_text(&self.text_content, context),
        }
    }

    /// Every placeholder across subject and bodies
    pub fn variables(&self) -> Vec<String> {
        let mut names = placeholders(&self.subject);
        for name in placeholders(&self.html_content)
            .into_iter()
            .chain(placeholders(&self.text_content))
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn increment_usage(&mut self, now: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used = Some(now);
        self.updated_at = now;
    }

    /// Only active templates go out with campaigns
    pub fn is_usable(&self) -> bool {
        self.status == TemplateStatus::Active && !self.is_deleted
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder() -> EmailTemplate {
        EmailTemplate::new(
            "Renewal reminder",
            "{{customer_name}}, policy {{policy_number}} renews soon",
            TemplateType::RenewalReminder,
            "<p>Dear {{ customer_name }},</p><p>Renew by {{expiry_date}}.</p>",
        )
        .unwrap()
        .with_text("Dear {{customer_name}}, renew by {{expiry_date}}.")
    }

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let context = TemplateContext::new()
            .with("customer_name", "Asha Rao")
            .with("policy_number", "POL-001");
        let rendered = reminder().render(&context);
        assert_eq!(rendered.subject, "Asha Rao, policy POL-001 renews soon");
        assert_eq!(rendered.html_content, "<p>Dear Asha Rao,</p><p>Renew by {{expiry_date}}.</p>");
        assert_eq!(rendered.text_content, "Dear Asha Rao, renew by {{expiry_date}}.");
    }

    #[test]
    fn test_values_are_not_rendered_twice() {
        let context = TemplateContext::new()
            .with("customer_name", "{{policy_number}}")
            .with("policy_number", "POL-001");
        assert_eq!(render_text("Hi {{customer_name}}", &context), "Hi {{policy_number}}");
    }

    #[test]
    fn test_variables_are_collected_once() {
        assert_eq!(
            reminder().variables(),
            vec!["customer_name", "policy_number", "expiry_date"]
        );
        assert!(placeholders("{{ not valid }} {{9lives}}").is_empty());
    }

    #[test]
    fn test_new_template_requires_content() {
        assert!(EmailTemplate::new("x", "subject", TemplateType::Custom, "  ").is_err());
        assert!(EmailTemplate::new("", "subject", TemplateType::Custom, "body").is_err());
    }

    #[test]
    fn test_only_active_templates_are_usable() {
        let mut template = reminder();
        assert!(!template.is_usable());
        template = template.activate();
        assert!(template.is_usable());
        template.soft_delete();
        assert!(!template.is_usable());
    }
}
