//! Campaign and email template DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use core_kernel::EmailTemplateId;
use domain_campaign::{
    Audience, CampaignChannel, CampaignStatus, TemplateContext, TemplateFilter, TemplateStatus,
    TemplateType,
};

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub template_type: Option<TemplateType>,
    pub status: Option<TemplateStatus>,
    /// Comma separated; every tag must match
    pub tags: Option<String>,
    pub search: Option<String>,
}

impl TemplateQuery {
    pub fn into_filter(self) -> TemplateFilter {
        TemplateFilter {
            template_type: self.template_type,
            status: self.status,
            tags: self
                .tags
                .map(|tags| {
                    tags.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            search: self.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub subject: String,
    pub template_type: TemplateType,
    pub status: Option<TemplateStatus>,
    #[validate(length(min = 1))]
    pub html_content: String,
    #[serde(default)]
    pub text_content: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub subject: Option<String>,
    pub template_type: Option<TemplateType>,
    pub status: Option<TemplateStatus>,
    #[validate(length(min = 1))]
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub context: TemplateContext,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestEmailRequest {
    #[validate(email)]
    pub to: String,
    #[serde(default)]
    pub context: TemplateContext,
}

#[derive(Debug, Default, Deserialize)]
pub struct CampaignQuery {
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub channels: Vec<CampaignChannel>,
    pub template_id: Option<EmailTemplateId>,
    #[validate(length(max = 500))]
    pub subject_line: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub description: Option<Option<String>>,
    #[validate(length(min = 1))]
    pub channels: Option<Vec<CampaignChannel>>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub template_id: Option<Option<EmailTemplateId>>,
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub subject_line: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CampaignStatusRequest {
    pub status: CampaignStatus,
    /// Required when scheduling
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddRecipientsRequest {
    pub audience: Audience,
}

/// Query string of the public tracking endpoints
#[derive(Debug, Deserialize)]
pub struct TrackingQuery {
    pub t: String,
    /// Redirect target of a click
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_split_and_trimmed() {
        let query = TemplateQuery {
            tags: Some(" renewal, ,motor ".into()),
            search: Some("  ".into()),
            ..Default::default()
        };
        let filter = query.into_filter();
        assert_eq!(filter.tags, vec!["renewal", "motor"]);
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_campaign_needs_a_channel() {
        let body = r#"{"name": "Q3", "channels": []}"#;
        let request: CreateCampaignRequest = serde_json::from_str(body).unwrap();
        assert!(request.validate().is_err());

        let body = r#"{"name": "Q3", "channels": ["email", "sms"]}"#;
        let request: CreateCampaignRequest = serde_json::from_str(body).unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_test_email_context_is_a_flat_map() {
        let body = r#"{"to": "qa@insurer.test", "context": {"customer_name": "Asha"}}"#;
        let request: TestEmailRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.context.get("customer_name"), Some("Asha"));
    }
}
