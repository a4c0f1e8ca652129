//! API error handling
//!
//! Every handler returns [`ApiError`]; domain and infrastructure errors map
//! onto it through `From` so handlers can use `?` throughout.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::{CoreError, PortError};
use domain_campaign::CampaignError;
use domain_customer::CustomerError;
use domain_hierarchy::HierarchyError;
use domain_insights::InsightError;
use domain_messaging::MessagingError;
use domain_policy::PolicyError;
use domain_renewal::RenewalError;
use infra_db::DatabaseError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    /// An upstream dependency (email provider, database pool) is unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ApiError::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let (message, details) = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg)
            | ApiError::Database(msg)
            | ApiError::Unavailable(msg) => (msg, None),
            ApiError::Unauthorized => ("Unauthorized".to_string(), None),
            ApiError::Validation { message, details } => {
                (message, (!details.is_empty()).then_some(details))
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation {
            message: "Request validation failed".to_string(),
            details,
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DatabaseError::DuplicateEntry(msg) => ApiError::Conflict(msg),
            DatabaseError::ForeignKeyViolation(msg) | DatabaseError::ConstraintViolation(msg) => {
                ApiError::validation(msg)
            }
            DatabaseError::PoolExhausted | DatabaseError::ConnectionFailed(_) => {
                ApiError::Unavailable(err.to_string())
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match &err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { .. } => ApiError::validation(err.to_string()),
            PortError::Conflict { message } => ApiError::Conflict(message.clone()),
            PortError::Unauthorized { .. } => ApiError::Unauthorized,
            e if e.is_transient() => ApiError::Unavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::InvalidStateTransition(msg) => ApiError::Conflict(msg),
            CoreError::Configuration(msg) => ApiError::Internal(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<CustomerError> for ApiError {
    fn from(err: CustomerError) -> Self {
        match err {
            CustomerError::CustomerNotFound(_) | CustomerError::CommunicationNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CustomerError::DuplicateCode(_) => ApiError::Conflict(err.to_string()),
            CustomerError::Deleted(_) => ApiError::NotFound(err.to_string()),
            CustomerError::InvalidData(msg) => ApiError::validation(msg),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::PolicyNotFound(_) | PolicyError::PolicyTypeNotFound(_) | PolicyError::ClaimNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            PolicyError::InvalidStateTransition { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::validation(err.to_string()),
        }
    }
}

impl From<RenewalError> for ApiError {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::CaseNotFound(_) | RenewalError::PaymentNotFound(_) => ApiError::NotFound(err.to_string()),
            RenewalError::CaseClosed { .. } => ApiError::Conflict(err.to_string()),
            _ => ApiError::validation(err.to_string()),
        }
    }
}

impl From<HierarchyError> for ApiError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::UnitNotFound(_) => ApiError::NotFound(err.to_string()),
            HierarchyError::DuplicateManager(_) | HierarchyError::DuplicateUnit { .. } => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::validation(err.to_string()),
        }
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::ProviderNotFound(_) => ApiError::NotFound(err.to_string()),
            MessagingError::InvalidEmail(msg) => ApiError::validation(msg),
            MessagingError::AllProvidersFailed { .. } | MessagingError::Transport { .. } => {
                ApiError::Unavailable(err.to_string())
            }
            MessagingError::Credentials(_) | MessagingError::Configuration(_) => {
                ApiError::BadRequest(err.to_string())
            }
            MessagingError::Store(port) => port.into(),
        }
    }
}

impl From<CampaignError> for ApiError {
    fn from(err: CampaignError) -> Self {
        match err {
            CampaignError::CampaignNotFound(_)
            | CampaignError::TemplateNotFound(_)
            | CampaignError::UnknownTrackingId(_) => ApiError::NotFound(err.to_string()),
            CampaignError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            CampaignError::NoEmailChannel(_) => ApiError::BadRequest(err.to_string()),
            CampaignError::Validation(msg) => ApiError::validation(msg),
            CampaignError::Messaging(e) => e.into(),
            CampaignError::Store(port) => port.into(),
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::CustomerNotFound(_) => ApiError::NotFound(err.to_string()),
            InsightError::Validation(msg) => ApiError::validation(msg),
            InsightError::Serialization(e) => ApiError::Internal(e.to_string()),
            InsightError::Port(port) => port.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_body_carries_details() {
        let (status, body) = body_json(ApiError::Validation {
            message: "Request validation failed".into(),
            details: vec!["email: email".into()],
        })
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0], "email: email");
    }

    #[tokio::test]
    async fn test_not_found_omits_details() {
        let (status, body) = body_json(DatabaseError::not_found("Customer", "CUS-1").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_domain_mappings() {
        assert!(matches!(
            ApiError::from(PolicyError::invalid_transition("settled", "approved")),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(HierarchyError::DuplicateManager("mgr-001".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(MessagingError::AllProvidersFailed { attempted: vec![] }),
            ApiError::Unavailable(_)
        ));
        assert!(matches!(
            ApiError::from(DatabaseError::DuplicateEntry("code".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(CampaignError::UnknownTrackingId("abc".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(CampaignError::Messaging(MessagingError::AllProvidersFailed { attempted: vec![] })),
            ApiError::Unavailable(_)
        ));
    }
}
