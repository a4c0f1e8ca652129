//! Campaign, email template and tracking handlers
//!
//! Writes and sends need the campaign role. The tracking endpoints are
//! public because mail clients call them: an unknown open still gets the
//! pixel, an unknown click is a 404 so the redirect cannot be borrowed.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::Utc;
use tracing::{debug, info};
use validator::Validate;

use core_kernel::{CampaignId, EmailTemplateId};
use domain_campaign::{
    Campaign, CampaignError, CampaignMetrics, CampaignRecipient, CampaignStatus, EmailTemplate,
    RecipientsAdded, RenderedEmail, SendSummary, TRACKING_PIXEL_GIF,
};
use domain_messaging::SendOutcome;

use crate::{AppState, error::ApiError};
use crate::auth::{permissions, require_role, Claims};
use crate::dto::campaign::*;

// ============================================================================
// Templates
// ============================================================================

pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<EmailTemplate>>, ApiError> {
    Ok(Json(state.campaigns.list_templates(&query.into_filter()).await?))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
) -> Result<Json<EmailTemplate>, ApiError> {
    Ok(Json(state.campaigns.get_template(id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<EmailTemplate>), ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    request.validate()?;

    let mut template = EmailTemplate::new(request.name, request.subject, request.template_type, request.html_content)?
        .with_text(request.text_content);
    if let Some(status) = request.status {
        template.status = status;
    }
    template.description = request.description;
    template.tags = request.tags;
    template.is_default = request.is_default;

    let created = state.campaigns.create_template(template).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<EmailTemplateId>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<EmailTemplate>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    request.validate()?;

    let mut template = state.campaigns.get_template(id).await?;
    if let Some(name) = request.name {
        template.name = name;
    }
    if let Some(subject) = request.subject {
        template.subject = subject;
    }
    if let Some(template_type) = request.template_type {
        template.template_type = template_type;
    }
    if let Some(status) = request.status {
        template.status = status;
    }
    if let Some(html) = request.html_content {
        template.html_content = html;
    }
    if let Some(text) = request.text_content {
        template.text_content = text;
    }
    if let Some(description) = request.description {
        template.description = description;
    }
    if let Some(tags) = request.tags {
        template.tags = tags;
    }
    if let Some(is_default) = request.is_default {
        template.is_default = is_default;
    }
    template.updated_at = Utc::now();

    let updated = state.campaigns.update_template(template).await?;
    info!(template_id = %id, by = %user.sub, "Email template updated");
    Ok(Json(updated))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<EmailTemplateId>,
) -> Result<StatusCode, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    state.campaigns.delete_template(id).await?;
    info!(template_id = %id, by = %user.sub, "Email template deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Renders with the supplied values; missing placeholders stay visible
pub async fn preview_template(
    State(state): State<AppState>,
    Path(id): Path<EmailTemplateId>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<RenderedEmail>, ApiError> {
    Ok(Json(state.campaigns.preview_template(id, &request.context).await?))
}

pub async fn send_test_email(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<EmailTemplateId>,
    Json(request): Json<TestEmailRequest>,
) -> Result<Json<SendOutcome>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    request.validate()?;
    Ok(Json(state.campaigns.send_test_email(id, &request.to, &request.context).await?))
}

// ============================================================================
// Campaigns
// ============================================================================

pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignQuery>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    Ok(Json(state.campaigns.list_campaigns(query.status).await?))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
) -> Result<Json<Campaign>, ApiError> {
    Ok(Json(state.campaigns.get_campaign(id).await?))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    request.validate()?;

    let mut campaign = Campaign::new(request.name, request.channels, user.sub.clone())?;
    campaign.description = request.description;
    campaign.template_id = request.template_id;
    campaign.subject_line = request.subject_line;
    if let Some(at) = request.scheduled_at {
        campaign.schedule(at, Utc::now())?;
    }

    let created = state.campaigns.create_campaign(campaign).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
    Json(request): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    request.validate()?;

    let current = state.campaigns.get_campaign(id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::Conflict(format!("campaign is {}", current.status)));
    }

    // Rebuilt through the constructor so name and channel rules apply
    let mut campaign = Campaign::new(
        request.name.unwrap_or(current.name.clone()),
        request.channels.unwrap_or(current.channels.clone()),
        current.created_by.clone(),
    )?;
    campaign.id = current.id;
    campaign.status = current.status;
    campaign.description = request.description.unwrap_or(current.description);
    campaign.template_id = request.template_id.unwrap_or(current.template_id);
    campaign.subject_line = request.subject_line.unwrap_or(current.subject_line);
    campaign.scheduled_at = current.scheduled_at;
    campaign.started_at = current.started_at;
    campaign.completed_at = current.completed_at;
    campaign.target_count = current.target_count;
    campaign.statistics = current.statistics;
    campaign.created_at = current.created_at;

    let updated = state.campaigns.update_campaign(campaign).await?;
    info!(campaign_id = %id, by = %user.sub, "Campaign updated");
    Ok(Json(updated))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
    Json(request): Json<CampaignStatusRequest>,
) -> Result<Json<Campaign>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    let campaign = match (request.status, request.scheduled_at) {
        (CampaignStatus::Scheduled, Some(at)) => state.campaigns.schedule_campaign(id, at).await?,
        (CampaignStatus::Scheduled, None) => {
            return Err(ApiError::validation("scheduled_at is required to schedule a campaign"))
        }
        (status, _) => state.campaigns.change_status(id, status).await?,
    };
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
) -> Result<StatusCode, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    state.campaigns.delete_campaign(id).await?;
    info!(campaign_id = %id, by = %user.sub, "Campaign deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_recipients(
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
) -> Result<Json<Vec<CampaignRecipient>>, ApiError> {
    Ok(Json(state.campaigns.recipients(id).await?))
}

pub async fn add_recipients(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
    Json(request): Json<AddRecipientsRequest>,
) -> Result<Json<RecipientsAdded>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    Ok(Json(state.campaigns.add_recipients(id, request.audience).await?))
}

/// Sends to every pending recipient
pub async fn send_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
) -> Result<Json<SendSummary>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    let summary = state.campaigns.send_campaign_emails(id).await?;
    info!(campaign_id = %id, sent = summary.sent, failed = summary.failed, by = %user.sub, "Campaign sent");
    Ok(Json(summary))
}

pub async fn retry_failed(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<CampaignId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, permissions::CAMPAIGN_MANAGE)?;
    let reset = state.campaigns.retry_failed(id).await?;
    Ok(Json(serde_json::json!({ "campaign_id": id, "reset": reset })))
}

pub async fn metrics(
    State(state): State<AppState>,
    Path(id): Path<CampaignId>,
) -> Result<Json<CampaignMetrics>, ApiError> {
    Ok(Json(state.campaigns.metrics(id).await?))
}

// ============================================================================
// Tracking
// ============================================================================

pub async fn track_open(State(state): State<AppState>, Query(query): Query<TrackingQuery>) -> Response {
    if let Err(e) = state.campaigns.track_open(&query.t).await {
        debug!(tracking_id = %query.t, error = %e, "Open not recorded");
    }
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        TRACKING_PIXEL_GIF,
    )
        .into_response()
}

/// Records the click and redirects to the original link
pub async fn track_click(
    State(state): State<AppState>,
    Query(query): Query<TrackingQuery>,
) -> Result<Redirect, ApiError> {
    let target = query
        .url
        .filter(|u| u.starts_with("https://") || u.starts_with("http://"))
        .ok_or_else(|| ApiError::BadRequest("a http(s) url is required".into()))?;
    match state.campaigns.track_click(&query.t).await {
        Ok(()) => Ok(Redirect::to(&target)),
        Err(e @ CampaignError::UnknownTrackingId(_)) => Err(e.into()),
        Err(e) => {
            debug!(tracking_id = %query.t, error = %e, "Click not recorded");
            Ok(Redirect::to(&target))
        }
    }
}
