//! Communication log handlers

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::Utc;
use validator::Validate;

use core_kernel::{CommunicationLogId, Page, PageRequest};
use domain_customer::CommunicationLog;
use infra_db::CommunicationFilter;

use crate::{AppState, error::ApiError};
use crate::dto::communication::*;

/// Lists live logs, newest first
pub async fn list_logs(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<CommunicationQuery>,
) -> Result<Json<Page<CommunicationLog>>, ApiError> {
    let filter = CommunicationFilter {
        customer_id: query.customer_id,
        channel: query.channel,
    };
    Ok(Json(state.communications.list(&filter, page).await?))
}

pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<CommunicationLogId>,
) -> Result<Json<CommunicationLog>, ApiError> {
    Ok(Json(state.communications.get(id).await?))
}

/// Records a communication; the customer's last contact date follows
pub async fn create_log(
    State(state): State<AppState>,
    Json(request): Json<CreateCommunicationRequest>,
) -> Result<(StatusCode, Json<CommunicationLog>), ApiError> {
    request.validate()?;

    let mut log = CommunicationLog::new(
        request.customer_id,
        request.channel,
        request.communication_date.unwrap_or_else(Utc::now),
        request.outcome,
        request.message_content,
    );
    if let Some(received) = request.response_received {
        log.response_received = received;
    }

    let created = state.communications.create(&log).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_log(
    State(state): State<AppState>,
    Path(id): Path<CommunicationLogId>,
    Json(request): Json<UpdateCommunicationRequest>,
) -> Result<Json<CommunicationLog>, ApiError> {
    request.validate()?;

    let mut log = state.communications.get(id).await?;
    if log.is_deleted {
        return Err(ApiError::NotFound(format!("Communication log {} not found", id)));
    }
    if let Some(customer_id) = request.customer_id {
        log.customer_id = customer_id;
    }
    if let Some(channel) = request.channel {
        log.channel = channel;
    }
    if let Some(date) = request.communication_date {
        log.communication_date = date;
    }
    if let Some(outcome) = request.outcome {
        log.outcome = outcome;
    }
    if let Some(content) = request.message_content {
        log.message_content = content;
    }
    if let Some(received) = request.response_received {
        log.response_received = received;
    }

    Ok(Json(state.communications.update(&log).await?))
}

/// Soft-deletes a log
pub async fn delete_log(
    State(state): State<AppState>,
    Path(id): Path<CommunicationLogId>,
) -> Result<StatusCode, ApiError> {
    state.communications.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removes a log permanently
pub async fn purge_log(
    State(state): State<AppState>,
    Path(id): Path<CommunicationLogId>,
) -> Result<StatusCode, ApiError> {
    state.communications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
