//! Policy type and policy handlers
//!
//! Every policy write refreshes the owning customer's policy metrics.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use validator::Validate;

use core_kernel::{CustomerId, Page, PageRequest, PolicyId, PolicyTypeId};
use domain_policy::{Policy, PolicyType};
use infra_db::PolicyFilter;

use crate::{AppState, error::ApiError};
use crate::dto::policy::*;

pub async fn list_types(
    State(state): State<AppState>,
    Query(query): Query<PolicyTypeQuery>,
) -> Result<Json<Vec<PolicyType>>, ApiError> {
    Ok(Json(state.policies.list_types(query.active_only).await?))
}

pub async fn get_type(
    State(state): State<AppState>,
    Path(id): Path<PolicyTypeId>,
) -> Result<Json<PolicyType>, ApiError> {
    Ok(Json(state.policies.get_type(id).await?))
}

pub async fn create_type(
    State(state): State<AppState>,
    Json(request): Json<CreatePolicyTypeRequest>,
) -> Result<(StatusCode, Json<PolicyType>), ApiError> {
    request.validate()?;

    let mut policy_type = PolicyType::new(request.name, request.code, request.base_premium_rate)?;
    policy_type.description = request.description;
    if let Some(active) = request.is_active {
        policy_type.is_active = active;
    }

    let created = state.policies.create_type(&policy_type).await?;
    info!(policy_type_id = %created.id, code = %created.code, "Policy type created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_type(
    State(state): State<AppState>,
    Path(id): Path<PolicyTypeId>,
    Json(request): Json<UpdatePolicyTypeRequest>,
) -> Result<Json<PolicyType>, ApiError> {
    request.validate()?;

    let mut policy_type = state.policies.get_type(id).await?;
    if let Some(name) = request.name {
        policy_type.name = name;
    }
    if request.description.is_some() {
        policy_type.description = request.description;
    }
    if let Some(rate) = request.base_premium_rate {
        if rate.is_sign_negative() {
            return Err(ApiError::validation("base premium rate cannot be negative"));
        }
        policy_type.base_premium_rate = rate;
    }
    if let Some(active) = request.is_active {
        policy_type.is_active = active;
    }

    Ok(Json(state.policies.update_type(&policy_type).await?))
}

/// Lists live policies
pub async fn list_policies(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<PolicyQuery>,
) -> Result<Json<Page<Policy>>, ApiError> {
    let filter = PolicyFilter {
        customer_id: query.customer_id,
        policy_type_id: query.policy_type_id,
        status: query.status,
    };
    Ok(Json(state.policies.list(&filter, page).await?))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<PolicyId>,
) -> Result<Json<Policy>, ApiError> {
    Ok(Json(state.policies.get(id).await?))
}

/// Active policies ending within the renewal window
pub async fn due_for_renewal(
    State(state): State<AppState>,
    Query(query): Query<DueForRenewalQuery>,
) -> Result<Json<Vec<Policy>>, ApiError> {
    let today = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.policies.due_for_renewal(today).await?))
}

/// Creates a new policy
pub async fn create_policy(
    State(state): State<AppState>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    request.validate()?;

    state.customers.get(request.customer_id).await?;
    state.policies.get_type(request.policy_type_id).await?;

    let mut policy = Policy::new(
        request.policy_number,
        request.customer_id,
        request.policy_type_id,
        request.start_date,
        request.end_date,
        request.premium_amount,
        request.sum_assured,
    )?;
    if let Some(frequency) = request.payment_frequency {
        policy = policy.with_frequency(frequency);
    }
    if let Some(status) = request.status {
        policy.status = status;
    }
    policy.nominee_name = request.nominee_name;
    policy.nominee_relationship = request.nominee_relationship;
    policy.agent_name = request.agent_name;
    policy.agent_code = request.agent_code;

    let created = state.policies.create(&policy).await?;
    info!(policy_id = %created.id, policy_number = %created.policy_number, "Policy created");
    refresh_customer(&state, created.customer_id).await;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Updates a policy
pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<PolicyId>,
    Json(request): Json<UpdatePolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    request.validate()?;

    let mut policy = state.policies.get(id).await?;
    if let Some(type_id) = request.policy_type_id {
        state.policies.get_type(type_id).await?;
        policy.policy_type_id = type_id;
    }
    if let Some(start) = request.start_date {
        policy.start_date = start;
    }
    if let Some(end) = request.end_date {
        policy.end_date = end;
    }
    if let Some(premium) = request.premium_amount {
        policy.premium_amount = premium;
    }
    if let Some(sum_assured) = request.sum_assured {
        policy.sum_assured = sum_assured;
    }
    if let Some(status) = request.status {
        policy.status = status;
    }
    if let Some(frequency) = request.payment_frequency {
        policy.payment_frequency = frequency;
    }
    if request.nominee_name.is_some() {
        policy.nominee_name = request.nominee_name;
    }
    if request.nominee_relationship.is_some() {
        policy.nominee_relationship = request.nominee_relationship;
    }
    if request.agent_name.is_some() {
        policy.agent_name = request.agent_name;
    }
    if request.agent_code.is_some() {
        policy.agent_code = request.agent_code;
    }
    check_policy(&policy)?;

    let updated = state.policies.update(&policy).await?;
    refresh_customer(&state, updated.customer_id).await;
    Ok(Json(updated))
}

/// Soft-deletes a policy
pub async fn delete_policy(
    State(state): State<AppState>,
    Path(id): Path<PolicyId>,
) -> Result<StatusCode, ApiError> {
    let policy = state.policies.get(id).await?;
    state.policies.soft_delete(id).await?;
    info!(policy_id = %id, "Policy deleted");
    refresh_customer(&state, policy.customer_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// The date and amount rules `Policy::new` enforces, for edited policies
fn check_policy(policy: &Policy) -> Result<(), ApiError> {
    policy.validate()?;
    if policy.end_date <= policy.start_date {
        return Err(ApiError::validation("end date must be after start date"));
    }
    if policy.premium_amount < Decimal::ZERO || policy.sum_assured < Decimal::ZERO {
        return Err(ApiError::validation("amounts cannot be negative"));
    }
    Ok(())
}

/// The policy write has committed; a failed refresh is logged, not returned
async fn refresh_customer(state: &AppState, customer_id: CustomerId) {
    match state.customers.refresh_metrics(customer_id).await {
        Ok(update) => info!(
            %customer_id,
            old_count = update.old_count,
            new_count = update.new_count,
            "Customer metrics refreshed"
        ),
        Err(e) => warn!(%customer_id, error = %e, "Customer metrics refresh failed"),
    }
}
