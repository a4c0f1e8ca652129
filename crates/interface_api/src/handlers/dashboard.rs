//! Renewal dashboard

use axum::{extract::State, Json};

use domain_renewal::DashboardSummary;

use crate::{AppState, error::ApiError};

/// Case counts and payment totals across all renewal cases
pub async fn summary(State(state): State<AppState>) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.renewals.dashboard().await?))
}
