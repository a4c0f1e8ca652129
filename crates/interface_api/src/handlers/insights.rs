//! Customer insight handlers

use axum::{extract::{Path, Query, State}, Json};
use tracing::info;
use validator::Validate;

use core_kernel::{CustomerId, Page, PageRequest};
use domain_insights::{
    BulkRecalculation, ClaimsHistory, ClaimsInsights, CommunicationHistory, CommunicationInsights,
    CustomerInsightSummary, CustomerInsights, InsightFilter, InsightRecord, InsightsDashboard,
    PaymentHistory, PaymentInsights, PaymentSchedule, ProfileInsights,
};

use crate::{AppState, error::ApiError};
use crate::dto::insight::*;

/// Every section, served from cache unless stale or `force_refresh` is set
pub async fn customer_insights(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<CustomerInsights>, ApiError> {
    Ok(Json(state.insights.customer_insights(id, query.force_refresh).await?))
}

pub async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CustomerInsights>, ApiError> {
    let insights = state.insights.recalculate(id).await?;
    info!(customer_id = %id, "Customer insights recalculated");
    Ok(Json(insights))
}

pub async fn payment_insights(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<PaymentInsights>, ApiError> {
    Ok(Json(state.insights.payment_insights(id, query.force_refresh).await?))
}

pub async fn communication_insights(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<CommunicationInsights>, ApiError> {
    Ok(Json(state.insights.communication_insights(id, query.force_refresh).await?))
}

pub async fn claims_insights(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ClaimsInsights>, ApiError> {
    Ok(Json(state.insights.claims_insights(id, query.force_refresh).await?))
}

pub async fn profile_insights(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<ProfileInsights>, ApiError> {
    Ok(Json(state.insights.profile_insights(id, query.force_refresh).await?))
}

/// Raw cached sections with their calculation times
pub async fn cached_records(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Vec<InsightRecord>>, ApiError> {
    Ok(Json(state.insights.cached_records(id).await?))
}

pub async fn payment_schedule(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<PaymentSchedule>, ApiError> {
    Ok(Json(state.insights.payment_schedule(id).await?))
}

pub async fn payment_history(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<PaymentHistory>, ApiError> {
    Ok(Json(state.insights.payment_history(id, query.years).await?))
}

pub async fn communication_history(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CommunicationHistory>, ApiError> {
    Ok(Json(state.insights.communication_history(id).await?))
}

pub async fn claims_history(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<ClaimsHistory>, ApiError> {
    Ok(Json(state.insights.claims_history(id).await?))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<InsightsDashboard>, ApiError> {
    Ok(Json(state.insights.dashboard().await?))
}

/// Cached summaries matching the filter
pub async fn summary(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<InsightFilter>,
) -> Result<Json<Page<CustomerInsightSummary>>, ApiError> {
    Ok(Json(state.insights.summary(&filter, page).await?))
}

pub async fn bulk_recalculate(
    State(state): State<AppState>,
    Json(request): Json<BulkRecalculateRequest>,
) -> Result<Json<BulkRecalculation>, ApiError> {
    request.validate()?;
    let result = state
        .insights
        .bulk_recalculate(&request.customer_ids, request.force_refresh)
        .await?;
    info!(
        requested = result.total_requested,
        updated = result.updated_count,
        failed = result.failed.len(),
        "Bulk insight recalculation finished"
    );
    Ok(Json(result))
}
