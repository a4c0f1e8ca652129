//! Claims handlers

use axum::{extract::{Path, Query, State}, http::StatusCode, Extension, Json};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use core_kernel::{ClaimId, Page, PageRequest};
use domain_policy::{ClaimStatus, PolicyClaim};
use infra_db::ClaimFilter;

use crate::{AppState, error::ApiError};
use crate::auth::{permissions, require_role, Claims};
use crate::dto::claims::*;

/// Submits a new claim against a live policy
pub async fn submit_claim(
    State(state): State<AppState>,
    Json(request): Json<SubmitClaimRequest>,
) -> Result<(StatusCode, Json<PolicyClaim>), ApiError> {
    state.policies.get(request.policy_id).await?;

    let claim = PolicyClaim::submit(
        request.policy_id,
        request.claim_type,
        request.claim_amount,
        request.incident_date,
        request.claim_date.unwrap_or_else(|| Utc::now().date_naive()),
    )?;

    let created = state.claims.create(&claim).await?;
    info!(claim_number = %created.claim_number, policy_id = %created.policy_id, "Claim submitted");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Lists claims
pub async fn list_claims(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<ClaimQuery>,
) -> Result<Json<Page<PolicyClaim>>, ApiError> {
    let filter = ClaimFilter {
        policy_id: query.policy_id,
        customer_id: query.customer_id,
        status: query.status,
    };
    Ok(Json(state.claims.list(&filter, page).await?))
}

/// Gets a claim by ID
pub async fn get_claim(
    State(state): State<AppState>,
    Path(id): Path<ClaimId>,
) -> Result<Json<PolicyClaim>, ApiError> {
    Ok(Json(state.claims.get(id).await?))
}

/// Moves a claim through its workflow
///
/// Approving and rejecting need the claim approval role.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<ClaimId>,
    Json(request): Json<UpdateClaimStatusRequest>,
) -> Result<Json<PolicyClaim>, ApiError> {
    request.validate()?;

    let mut claim = state.claims.get(id).await?;
    match request.status {
        ClaimStatus::UnderReview => claim.start_review()?,
        ClaimStatus::Approved => {
            require_role(&user, permissions::CLAIM_APPROVE)?;
            let amount = request
                .approved_amount
                .ok_or_else(|| ApiError::validation("approved_amount is required to approve a claim"))?;
            claim.approve(amount)?;
        }
        ClaimStatus::Rejected => {
            require_role(&user, permissions::CLAIM_APPROVE)?;
            let reason = request
                .rejection_reason
                .ok_or_else(|| ApiError::validation("rejection_reason is required to reject a claim"))?;
            claim.reject(reason)?;
        }
        ClaimStatus::Settled => claim.settle()?,
        ClaimStatus::Withdrawn => claim.withdraw()?,
        ClaimStatus::Submitted => {
            return Err(ApiError::BadRequest("a claim cannot return to submitted".to_string()))
        }
    }

    let saved = state.claims.save_status(&claim).await?;
    info!(claim_number = %saved.claim_number, status = %saved.status, user = %user.sub, "Claim status changed");
    Ok(Json(saved))
}
