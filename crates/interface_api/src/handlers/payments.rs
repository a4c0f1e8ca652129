//! Customer payment handlers
//!
//! The repository keeps the linked case's payment status and installments
//! in step with every write.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use validator::Validate;

use core_kernel::{CustomerId, Page, PageRequest, PaymentId, RenewalCaseId};
use domain_renewal::CustomerPayment;
use infra_db::PaymentFilter;

use crate::{AppState, error::ApiError};
use crate::dto::payment::*;

pub async fn list_payments(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Page<CustomerPayment>>, ApiError> {
    let filter = PaymentFilter {
        customer_id: query.customer_id,
        renewal_case_id: query.renewal_case_id,
        status: query.status,
    };
    Ok(Json(state.payments.list(&filter, page).await?))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<CustomerPayment>, ApiError> {
    Ok(Json(state.payments.get(id).await?))
}

/// Records a payment
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CustomerPayment>), ApiError> {
    request.validate()?;

    state.customers.get(request.customer_id).await?;
    let mut payment = CustomerPayment::new(
        request.customer_id,
        request.amount,
        request.payment_date.unwrap_or_else(Utc::now),
        request.due_date,
        request.mode,
    )?;
    if let Some(case_id) = request.renewal_case_id {
        ensure_case_of(&state, case_id, request.customer_id).await?;
        payment = payment.for_case(case_id);
    }
    if let Some(status) = request.status {
        payment = payment.with_status(status);
    }
    payment.transaction_id = request.transaction_id;

    let created = state.payments.create(&payment).await?;
    info!(
        payment_id = %created.id,
        customer_id = %created.customer_id,
        status = %created.status,
        "Payment recorded"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<CustomerPayment>, ApiError> {
    request.validate()?;

    let mut payment = state.payments.get(id).await?;
    if let Some(case_id) = request.renewal_case_id {
        if let Some(case_id) = case_id {
            ensure_case_of(&state, case_id, payment.customer_id).await?;
        }
        payment.renewal_case_id = case_id;
    }
    if let Some(amount) = request.amount {
        if amount <= Decimal::ZERO {
            return Err(ApiError::validation("payment amount must be positive"));
        }
        payment.amount = amount;
    }
    if let Some(date) = request.payment_date {
        payment.payment_date = date;
    }
    if let Some(due) = request.due_date {
        payment.due_date = due;
    }
    if let Some(mode) = request.mode {
        payment.mode = mode;
    }
    if let Some(status) = request.status {
        payment.status = status;
    }
    if request.transaction_id.is_some() {
        payment.transaction_id = request.transaction_id;
    }

    Ok(Json(state.payments.update(&payment).await?))
}

/// Soft-deletes a payment
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<StatusCode, ApiError> {
    state.payments.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removes a payment permanently
pub async fn purge_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<StatusCode, ApiError> {
    state.payments.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_case_of(
    state: &AppState,
    case_id: RenewalCaseId,
    customer_id: CustomerId,
) -> Result<(), ApiError> {
    let case = state.renewals.get(case_id).await?;
    if case.customer_id != customer_id {
        return Err(ApiError::validation(format!(
            "renewal case {} belongs to another customer",
            case.case_number
        )));
    }
    Ok(())
}
