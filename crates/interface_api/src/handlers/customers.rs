//! Customer handlers

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use tracing::{info, warn};
use validator::Validate;

use core_kernel::{CustomerId, Page, PageRequest};
use domain_customer::{Customer, CustomerValidator, MetricsUpdate};
use infra_db::CustomerFilter;

use crate::{AppState, error::ApiError};
use crate::dto::customer::*;

/// Runs the business-rule validator; warnings are logged, errors rejected
pub(crate) fn check_customer(customer: &Customer) -> Result<(), ApiError> {
    customer.validate()?;
    let result = CustomerValidator::validate(customer);
    for warning in &result.warnings {
        warn!(customer_code = %customer.customer_code, %warning, "Customer validation warning");
    }
    match result.error_message() {
        None => Ok(()),
        Some(message) => Err(ApiError::Validation {
            message,
            details: result.errors,
        }),
    }
}

/// Lists live customers
pub async fn list_customers(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Page<Customer>>, ApiError> {
    let filter = CustomerFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        status: query.status,
        profile: query.profile,
    };
    Ok(Json(state.customers.list(&filter, page).await?))
}

/// Gets a customer by ID
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.get(id).await?))
}

/// Creates a new customer
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    request.validate()?;

    let mut customer = Customer::new(request.first_name, request.last_name);
    customer.email = request.email;
    customer.phone = request.phone;
    if let Some(status) = request.status {
        customer.status = status;
    }
    if let Some(priority) = request.priority {
        customer.priority = priority;
    }
    if let Some(profile) = request.profile {
        customer.profile = profile;
    }
    check_customer(&customer)?;

    let created = state.customers.create(&customer).await?;
    info!(customer_id = %created.id, customer_code = %created.customer_code, "Customer created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Updates a customer
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    request.validate()?;

    let mut customer = state.customers.get(id).await?;
    if let Some(code) = request.customer_code {
        customer.customer_code = code;
    }
    if let Some(first_name) = request.first_name {
        customer.first_name = first_name;
    }
    if let Some(last_name) = request.last_name {
        customer.last_name = last_name;
    }
    if request.email.is_some() {
        customer.email = request.email;
    }
    if request.phone.is_some() {
        customer.phone = request.phone;
    }
    if let Some(status) = request.status {
        customer.status = status;
    }
    if let Some(priority) = request.priority {
        customer.priority = priority;
    }
    if let Some(profile) = request.profile {
        customer.profile = profile;
    }
    check_customer(&customer)?;

    Ok(Json(state.customers.update(&customer).await?))
}

/// Soft-deletes a customer
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode, ApiError> {
    state.customers.soft_delete(id).await?;
    info!(customer_id = %id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Recomputes one customer's policy metrics
pub async fn refresh_metrics(
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<MetricsUpdate>, ApiError> {
    Ok(Json(state.customers.refresh_metrics(id).await?))
}

/// Recomputes every customer's policy metrics
pub async fn refresh_all_metrics(
    State(state): State<AppState>,
) -> Result<Json<RefreshMetricsResponse>, ApiError> {
    let changed = state.customers.refresh_all_metrics().await?;
    Ok(Json(changed.into()))
}
