//! Renewal case handlers

use axum::{extract::{Path, Query, State}, http::StatusCode, Extension, Json};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use core_kernel::{Page, PageRequest, RenewalCaseId};
use domain_renewal::{plan_installments, Installment, RenewalCase};
use infra_db::CaseFilter;

use crate::{AppState, error::ApiError};
use crate::auth::Claims;
use crate::dto::renewal::*;

pub async fn list_cases(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<CaseQuery>,
) -> Result<Json<Page<RenewalCase>>, ApiError> {
    let filter = CaseFilter {
        status: query.status,
        priority: query.priority,
        customer_id: query.customer_id,
        assigned_to: query.assigned_to,
    };
    Ok(Json(state.renewals.list(&filter, page).await?))
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
) -> Result<Json<RenewalCase>, ApiError> {
    Ok(Json(state.renewals.get(id).await?))
}

/// Opens a case for a policy and plans its installment schedule
pub async fn create_case(
    State(state): State<AppState>,
    Json(request): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<CaseWithInstallments>), ApiError> {
    request.validate()?;

    let policy = state.policies.get(request.policy_id).await?;
    let amount = request.renewal_amount.unwrap_or(policy.premium_amount);

    let mut case = RenewalCase::open(policy.id, policy.customer_id, request.batch_code, amount)?;
    if let Some(priority) = request.priority {
        case.priority = priority;
    }
    case.channel = request.channel;
    case.channel_source = request.channel_source;
    case.notes = request.notes;
    if let Some(user) = request.assigned_to {
        case.assign(user)?;
    }

    let start = request.installments_start.unwrap_or(policy.end_date);
    let installments = plan_installments(&policy, &case, start)?;

    let created = state.renewals.create(&case, &installments).await?;
    info!(
        case_number = %created.case_number,
        policy_id = %created.policy_id,
        installments = installments.len(),
        "Renewal case opened"
    );
    Ok((
        StatusCode::CREATED,
        Json(CaseWithInstallments {
            case: created,
            installments,
        }),
    ))
}

pub async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
    Json(request): Json<UpdateCaseRequest>,
) -> Result<Json<RenewalCase>, ApiError> {
    request.validate()?;

    let mut case = state.renewals.get(id).await?;
    if let Some(batch_code) = request.batch_code {
        case.batch_code = batch_code;
    }
    if let Some(priority) = request.priority {
        case.priority = priority;
    }
    if request.channel.is_some() {
        case.channel = request.channel;
    }
    if request.channel_source.is_some() {
        case.channel_source = request.channel_source;
    }
    if request.notes.is_some() {
        case.notes = request.notes;
    }

    Ok(Json(state.renewals.update(&case).await?))
}

/// Deletes a case and its schedule
pub async fn delete_case(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
) -> Result<StatusCode, ApiError> {
    state.renewals.delete(id).await?;
    info!(case_id = %id, "Renewal case deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_case(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<RenewalCaseId>,
    Json(request): Json<AssignCaseRequest>,
) -> Result<Json<RenewalCase>, ApiError> {
    request.validate()?;

    let mut case = state.renewals.get(id).await?;
    case.assign(request.assigned_to)?;
    let saved = state.renewals.update(&case).await?;
    info!(case_number = %saved.case_number, assigned_to = ?saved.assigned_to, by = %user.sub, "Renewal case assigned");
    Ok(Json(saved))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
    Json(request): Json<UpdateCaseStatusRequest>,
) -> Result<Json<RenewalCase>, ApiError> {
    let mut case = state.renewals.get(id).await?;
    case.set_status(request.status)?;
    Ok(Json(state.renewals.update(&case).await?))
}

/// Counts a contact attempt against the case
pub async fn record_contact(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
    Json(request): Json<RecordContactRequest>,
) -> Result<Json<RenewalCase>, ApiError> {
    let mut case = state.renewals.get(id).await?;
    case.record_contact(request.contacted_at.unwrap_or_else(Utc::now))?;
    Ok(Json(state.renewals.update(&case).await?))
}

pub async fn list_installments(
    State(state): State<AppState>,
    Path(id): Path<RenewalCaseId>,
) -> Result<Json<Vec<Installment>>, ApiError> {
    Ok(Json(state.renewals.installments(id).await?))
}

/// Flags unpaid installments whose due date has passed
pub async fn mark_overdue(
    State(state): State<AppState>,
    Query(query): Query<MarkOverdueQuery>,
) -> Result<Json<MarkOverdueResponse>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let updated = state.renewals.mark_overdue(as_of).await?;
    info!(%as_of, updated, "Installments marked overdue");
    Ok(Json(MarkOverdueResponse { as_of, updated }))
}
