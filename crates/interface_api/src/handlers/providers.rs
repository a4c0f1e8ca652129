//! Email provider handlers
//!
//! Provider configuration changes need the provider admin role and sending
//! needs the email role; reads are open to any authenticated caller.

use axum::{extract::{Path, Query, State}, http::StatusCode, Extension, Json};
use tracing::info;
use validator::Validate;

use core_kernel::{HealthCheckResult, ProviderId};
use domain_messaging::{
    EmailProviderConfig, OutgoingEmail, ProviderHealthLog, ProviderStatistics,
    ProviderTestResult, ProviderUsageLog, SendOutcome,
};

use crate::{AppState, error::ApiError};
use crate::auth::{permissions, require_role, Claims};
use crate::dto::provider::*;

pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmailProviderConfig>>, ApiError> {
    Ok(Json(state.providers.list_providers().await?))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<ProviderId>,
) -> Result<Json<EmailProviderConfig>, ApiError> {
    Ok(Json(state.providers.get_provider(id).await?))
}

/// The provider the next send would try first, if any can send
pub async fn available_provider(
    State(state): State<AppState>,
) -> Result<Json<Option<EmailProviderConfig>>, ApiError> {
    Ok(Json(state.providers.available_provider().await?))
}

pub async fn create_provider(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<EmailProviderConfig>), ApiError> {
    require_role(&user, permissions::PROVIDER_ADMIN)?;
    request.validate()?;

    let mut provider = EmailProviderConfig::new(request.name, request.provider_type, request.from_email);
    if let Some(priority) = request.priority {
        provider = provider.with_priority(priority);
    }
    provider.is_default = request.is_default;
    if let Some(active) = request.is_active {
        provider.is_active = active;
    }
    provider.from_name = request.from_name;
    provider.reply_to = request.reply_to;
    provider.region = request.region;
    provider.smtp_host = request.smtp_host;
    provider.smtp_username = request.smtp_username;
    if let Some(port) = request.smtp_port {
        provider.smtp_port = port;
    }
    if let Some(tls) = request.smtp_use_tls {
        provider.smtp_use_tls = tls;
    }
    if let Some(ssl) = request.smtp_use_ssl {
        provider.smtp_use_ssl = ssl;
    }
    if let Some(limit) = request.daily_limit {
        provider.daily_limit = limit;
    }
    if let Some(limit) = request.monthly_limit {
        provider.monthly_limit = limit;
    }
    if let Some(limit) = request.rate_limit_per_minute {
        provider.rate_limit_per_minute = limit;
    }
    if let Some(settings) = request.additional_settings {
        provider.additional_settings = settings;
    }

    let secrets = request.secrets.into_secrets();
    let created = state.providers.create_provider(provider, &secrets).await?;
    info!(provider_id = %created.id, by = %user.sub, "Email provider added");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<ProviderId>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<Json<EmailProviderConfig>, ApiError> {
    require_role(&user, permissions::PROVIDER_ADMIN)?;
    request.validate()?;

    let mut provider = state.providers.get_provider(id).await?;
    if let Some(name) = request.name {
        provider.name = name;
    }
    if let Some(from_email) = request.from_email {
        provider.from_email = from_email;
    }
    if request.from_name.is_some() {
        provider.from_name = request.from_name;
    }
    if request.reply_to.is_some() {
        provider.reply_to = request.reply_to;
    }
    if let Some(is_default) = request.is_default {
        provider.is_default = is_default;
    }
    if let Some(active) = request.is_active {
        provider.is_active = active;
    }
    if let Some(priority) = request.priority {
        provider.priority = priority;
    }
    if request.region.is_some() {
        provider.region = request.region;
    }
    if request.smtp_host.is_some() {
        provider.smtp_host = request.smtp_host;
    }
    if request.smtp_username.is_some() {
        provider.smtp_username = request.smtp_username;
    }
    if let Some(port) = request.smtp_port {
        provider.smtp_port = port;
    }
    if let Some(tls) = request.smtp_use_tls {
        provider.smtp_use_tls = tls;
    }
    if let Some(ssl) = request.smtp_use_ssl {
        provider.smtp_use_ssl = ssl;
    }
    if let Some(limit) = request.daily_limit {
        provider.daily_limit = limit;
    }
    if let Some(limit) = request.monthly_limit {
        provider.monthly_limit = limit;
    }
    if let Some(limit) = request.rate_limit_per_minute {
        provider.rate_limit_per_minute = limit;
    }
    if let Some(settings) = request.additional_settings {
        provider.additional_settings = settings;
    }

    let secrets = (!request.secrets.is_empty()).then(|| request.secrets.into_secrets());
    let updated = state.providers.update_provider(provider, secrets.as_ref()).await?;
    info!(provider_id = %id, by = %user.sub, secrets_changed = secrets.is_some(), "Email provider updated");
    Ok(Json(updated))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<ProviderId>,
) -> Result<StatusCode, ApiError> {
    require_role(&user, permissions::PROVIDER_ADMIN)?;
    state.providers.delete_provider(id).await?;
    info!(provider_id = %id, by = %user.sub, "Email provider deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<ProviderId>,
) -> Result<Json<EmailProviderConfig>, ApiError> {
    require_role(&user, permissions::PROVIDER_ADMIN)?;
    Ok(Json(state.providers.set_default(id).await?))
}

/// Sends a test message, or checks the connection when no address is given
pub async fn test_provider(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<ProviderId>,
    Json(request): Json<TestProviderRequest>,
) -> Result<Json<ProviderTestResult>, ApiError> {
    require_role(&user, permissions::PROVIDER_ADMIN)?;
    request.validate()?;
    Ok(Json(state.providers.test_provider(id, request.test_email.as_deref()).await?))
}

pub async fn check_health(
    State(state): State<AppState>,
    Path(id): Path<ProviderId>,
) -> Result<Json<HealthCheckResult>, ApiError> {
    Ok(Json(state.providers.check_provider_health(id).await?))
}

pub async fn health_check_all(
    State(state): State<AppState>,
) -> Result<Json<Vec<HealthCheckResult>>, ApiError> {
    Ok(Json(state.providers.health_check_all().await?))
}

/// Sends through the provider pool with failover
pub async fn send_email(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(email): Json<OutgoingEmail>,
) -> Result<Json<SendOutcome>, ApiError> {
    require_role(&user, permissions::EMAIL_SEND)?;
    let outcome = state.providers.send_email(&email).await?;
    info!(
        provider = %outcome.provider_name,
        message_id = %outcome.message_id,
        elapsed_ms = outcome.elapsed_ms,
        by = %user.sub,
        "Email sent"
    );
    Ok(Json(outcome))
}

pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderStatistics>>, ApiError> {
    Ok(Json(state.providers.statistics().await?))
}

pub async fn health_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ProviderHealthLog>>, ApiError> {
    Ok(Json(state.providers.health_logs(query.provider_id, query.limit()).await?))
}

pub async fn usage_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ProviderUsageLog>>, ApiError> {
    Ok(Json(state.providers.usage_logs(query.provider_id, query.limit()).await?))
}

pub async fn test_results(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ProviderTestResult>>, ApiError> {
    Ok(Json(state.providers.test_results(query.provider_id, query.limit()).await?))
}
