//! HTTP API Layer
//!
//! This crate provides the REST API for the renewal management system using
//! Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for each domain
//! - **Tracking**: Public open pixel and click redirect for campaign mail
//! - **Middleware**: Authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(pool, config)?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_campaign::CampaignService;
use domain_insights::InsightsService;
use domain_messaging::{CredentialVault, DefaultTransportFactory, EmailProviderService, MessagingError};
use infra_db::{
    ClaimRepository, CommunicationRepository, CustomerRepository, HierarchyRepository,
    PaymentRepository, PolicyRepository, PostgresCampaignStore, PostgresInsightSource,
    PostgresInsightStore, PostgresProviderStore, RenewalRepository,
};

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{
    campaigns, claims, communications, customers, dashboard, health, hierarchy, insights,
    payments, policies, providers, renewals,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: ApiConfig,
    pub customers: CustomerRepository,
    pub communications: CommunicationRepository,
    pub policies: PolicyRepository,
    pub claims: ClaimRepository,
    pub renewals: RenewalRepository,
    pub payments: PaymentRepository,
    pub hierarchy: HierarchyRepository,
    pub providers: Arc<EmailProviderService>,
    pub insights: Arc<InsightsService>,
    pub campaigns: Arc<CampaignService>,
}

impl AppState {
    /// Builds the Postgres-backed state
    ///
    /// Fails when the configured encryption key is not a base64 AES-256 key
    /// or the HTTP client for provider APIs cannot be built.
    pub fn new(pool: PgPool, config: ApiConfig) -> Result<Self, MessagingError> {
        let vault = CredentialVault::from_base64_key(&config.encryption_key)?;
        let transports = DefaultTransportFactory::new(config.provider_timeout())?;
        let providers = EmailProviderService::new(
            Arc::new(PostgresProviderStore::new(pool.clone())),
            Arc::new(vault),
            Arc::new(transports),
        )
        .with_credential_ttl(config.credential_ttl());

        let insights = InsightsService::new(
            Arc::new(PostgresInsightSource::new(pool.clone())),
            Arc::new(PostgresInsightStore::new(pool.clone())),
        )
        .with_ttl(config.insight_ttl());

        Ok(Self::with_services(pool, config, Arc::new(providers), Arc::new(insights)))
    }

    /// Builds state around already constructed services
    pub fn with_services(
        pool: PgPool,
        config: ApiConfig,
        providers: Arc<EmailProviderService>,
        insights: Arc<InsightsService>,
    ) -> Self {
        let campaigns = CampaignService::new(
            Arc::new(PostgresCampaignStore::new(pool.clone())),
            providers.clone(),
        )
        .with_settings(config.campaign_settings());

        Self {
            customers: CustomerRepository::new(pool.clone()),
            communications: CommunicationRepository::new(pool.clone()),
            policies: PolicyRepository::new(pool.clone()),
            claims: ClaimRepository::new(pool.clone()),
            renewals: RenewalRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            hierarchy: HierarchyRepository::new(pool.clone()),
            pool,
            config,
            providers,
            insights,
            campaigns: Arc::new(campaigns),
        }
    }

    /// Replaces the campaign service
    pub fn with_campaigns(mut self, campaigns: Arc<CampaignService>) -> Self {
        self.campaigns = campaigns;
        self
    }
}

/// Creates the main API router
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/track/open", get(campaigns::track_open))
        .route("/track/click", get(campaigns::track_click));

    let customer_routes = Router::new()
        .route("/", get(customers::list_customers).post(customers::create_customer))
        .route("/refresh-metrics", post(customers::refresh_all_metrics))
        .route(
            "/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .route("/:id/refresh-metrics", post(customers::refresh_metrics));

    let communication_routes = Router::new()
        .route("/", get(communications::list_logs).post(communications::create_log))
        .route(
            "/:id",
            get(communications::get_log)
                .put(communications::update_log)
                .delete(communications::delete_log),
        )
        .route("/:id/purge", axum::routing::delete(communications::purge_log));

    let policy_type_routes = Router::new()
        .route("/", get(policies::list_types).post(policies::create_type))
        .route("/:id", get(policies::get_type).put(policies::update_type));

    let policy_routes = Router::new()
        .route("/", get(policies::list_policies).post(policies::create_policy))
        .route("/due-for-renewal", get(policies::due_for_renewal))
        .route(
            "/:id",
            get(policies::get_policy)
                .put(policies::update_policy)
                .delete(policies::delete_policy),
        );

    let claim_routes = Router::new()
        .route("/", get(claims::list_claims).post(claims::submit_claim))
        .route("/:id", get(claims::get_claim))
        .route("/:id/status", put(claims::update_status));

    let renewal_routes = Router::new()
        .route("/", get(renewals::list_cases).post(renewals::create_case))
        .route("/installments/mark-overdue", post(renewals::mark_overdue))
        .route(
            "/:id",
            get(renewals::get_case)
                .put(renewals::update_case)
                .delete(renewals::delete_case),
        )
        .route("/:id/assign", post(renewals::assign_case))
        .route("/:id/status", put(renewals::update_status))
        .route("/:id/contact", post(renewals::record_contact))
        .route("/:id/installments", get(renewals::list_installments));

    let payment_routes = Router::new()
        .route("/", get(payments::list_payments).post(payments::create_payment))
        .route(
            "/:id",
            get(payments::get_payment)
                .put(payments::update_payment)
                .delete(payments::delete_payment),
        )
        .route("/:id/purge", axum::routing::delete(payments::purge_payment));

    let dashboard_routes = Router::new().route("/summary", get(dashboard::summary));

    let hierarchy_routes = Router::new()
        .route("/", get(hierarchy::list_units).post(hierarchy::create_unit))
        .route("/stats", get(hierarchy::stats))
        .route("/tree", get(hierarchy::tree))
        .route("/by-type/:unit_type", get(hierarchy::by_type))
        .route("/by-parent/:id", get(hierarchy::by_parent))
        .route(
            "/:id",
            get(hierarchy::get_unit)
                .put(hierarchy::update_unit)
                .delete(hierarchy::delete_unit),
        );

    let provider_routes = Router::new()
        .route("/", get(providers::list_providers).post(providers::create_provider))
        .route("/send", post(providers::send_email))
        .route("/available", get(providers::available_provider))
        .route("/statistics", get(providers::statistics))
        .route("/health-check-all", post(providers::health_check_all))
        .route("/health-logs", get(providers::health_logs))
        .route("/usage-logs", get(providers::usage_logs))
        .route("/test-results", get(providers::test_results))
        .route(
            "/:id",
            get(providers::get_provider)
                .put(providers::update_provider)
                .delete(providers::delete_provider),
        )
        .route("/:id/set-default", post(providers::set_default))
        .route("/:id/test", post(providers::test_provider))
        .route("/:id/health-check", post(providers::check_health));

    let insight_routes = Router::new()
        .route("/dashboard", get(insights::dashboard))
        .route("/summary", get(insights::summary))
        .route("/bulk-recalculate", post(insights::bulk_recalculate))
        .route("/customers/:id", get(insights::customer_insights))
        .route("/customers/:id/recalculate", post(insights::recalculate))
        .route("/customers/:id/records", get(insights::cached_records))
        .route("/customers/:id/payment", get(insights::payment_insights))
        .route("/customers/:id/communication", get(insights::communication_insights))
        .route("/customers/:id/claims", get(insights::claims_insights))
        .route("/customers/:id/profile", get(insights::profile_insights))
        .route("/customers/:id/payment-schedule", get(insights::payment_schedule))
        .route("/customers/:id/payment-history", get(insights::payment_history))
        .route("/customers/:id/communication-history", get(insights::communication_history))
        .route("/customers/:id/claims-history", get(insights::claims_history));

    let template_routes = Router::new()
        .route("/", get(campaigns::list_templates).post(campaigns::create_template))
        .route(
            "/:id",
            get(campaigns::get_template)
                .put(campaigns::update_template)
                .delete(campaigns::delete_template),
        )
        .route("/:id/preview", post(campaigns::preview_template))
        .route("/:id/test", post(campaigns::send_test_email));

    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns).post(campaigns::create_campaign))
        .route(
            "/:id",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route("/:id/status", put(campaigns::change_status))
        .route("/:id/recipients", get(campaigns::list_recipients).post(campaigns::add_recipients))
        .route("/:id/send", post(campaigns::send_campaign))
        .route("/:id/retry-failed", post(campaigns::retry_failed))
        .route("/:id/metrics", get(campaigns::metrics));

    // Protected API routes; the audit layer sits inside auth so it sees the claims
    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/communications", communication_routes)
        .nest("/policy-types", policy_type_routes)
        .nest("/policies", policy_routes)
        .nest("/claims", claim_routes)
        .nest("/renewals", renewal_routes)
        .nest("/payments", payment_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/hierarchy", hierarchy_routes)
        .nest("/email-providers", provider_routes)
        .nest("/insights", insight_routes)
        .nest("/email-templates", template_routes)
        .nest("/campaigns", campaign_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
