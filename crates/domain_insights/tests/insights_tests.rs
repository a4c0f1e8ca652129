//! Tests for the insights service over in-memory ports

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal_macros::dec;

use core_kernel::{CustomerId, PageRequest, PolicyTypeId};
use domain_customer::{
    CommunicationChannel, CommunicationLog, CommunicationOutcome, Customer, CustomerProfile,
};
use domain_insights::ports::mock::{InMemoryInsightSource, InMemoryInsightStore};
use domain_insights::{
    CustomerRecords, CustomerSegment, InsightError, InsightFilter, InsightStore, InsightType,
    InsightsService, PaymentReliability, ProfileInsights, RiskLevel,
};
use domain_policy::{ClaimType, Policy, PolicyClaim};
use domain_renewal::{CustomerPayment, PaymentMode, PaymentStatus};

fn days_ago(days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(days)
}

fn paid(customer_id: CustomerId, amount: rust_decimal::Decimal, paid_days_ago: i64, due_days_ago: i64) -> CustomerPayment {
    CustomerPayment::new(
        customer_id,
        amount,
        Utc::now() - Duration::days(paid_days_ago),
        days_ago(due_days_ago),
        PaymentMode::Upi,
    )
    .unwrap()
    .with_status(PaymentStatus::Completed)
}

/// A customer with one active motor policy, three payments, two contacts and one claim
fn sample_records(first_name: &str) -> CustomerRecords {
    let customer = Customer::new(first_name, "Sharma");
    let customer_id = customer.id;
    let mut records = CustomerRecords::new(customer);

    let type_id = PolicyTypeId::new();
    records.policy_type_names.insert(type_id, "Motor".to_string());
    let policy = Policy::new(
        format!("POL-{}", first_name),
        customer_id,
        type_id,
        days_ago(200),
        days_ago(200) + Duration::days(365),
        dec!(12000),
        dec!(500000),
    )
    .unwrap();

    records.payments = vec![
        paid(customer_id, dec!(1000), 100, 95),
        paid(customer_id, dec!(1000), 70, 65),
        paid(customer_id, dec!(1000), 30, 25),
    ];
    records.communications = vec![
        CommunicationLog::new(
            customer_id,
            CommunicationChannel::Email,
            Utc::now() - Duration::days(10),
            CommunicationOutcome::Delivered,
            "Renewal reminder",
        ),
        CommunicationLog::new(
            customer_id,
            CommunicationChannel::Email,
            Utc::now() - Duration::days(9),
            CommunicationOutcome::Replied,
            "Thanks, will renew",
        ),
    ];
    records.claims = vec![PolicyClaim::submit(
        policy.id,
        ClaimType::Vehicle,
        dec!(25000),
        days_ago(50),
        days_ago(45),
    )
    .unwrap()];
    records.policies = vec![policy];
    records
}

async fn service_with(records: Vec<CustomerRecords>) -> (InsightsService, Arc<InMemoryInsightSource>, Arc<InMemoryInsightStore>) {
    let source = Arc::new(InMemoryInsightSource::new());
    for r in records {
        source.insert(r).await;
    }
    let store = Arc::new(InMemoryInsightStore::new());
    let service = InsightsService::new(source.clone(), store.clone());
    (service, source, store)
}

// ============================================================================
// Per-customer insights
// ============================================================================

mod customer_insights_tests {
    use super::*;

    #[tokio::test]
    async fn test_computes_and_caches_every_section() {
        let records = sample_records("Asha");
        let customer_id = records.customer.id;
        let (service, _, store) = service_with(vec![records]).await;

        let insights = service.customer_insights(customer_id, false).await.unwrap();

        assert_eq!(insights.customer_info.id, customer_id);
        assert_eq!(insights.customer_info.full_name, "Asha Sharma");
        assert_eq!(insights.payment_insights.total_payments_made, 3);
        assert_eq!(insights.payment_insights.total_premiums_paid, dec!(3000));
        assert_eq!(insights.payment_insights.most_used_mode, Some(PaymentMode::Upi));
        assert_eq!(insights.communication_insights.total_communications, 2);
        assert_eq!(insights.claims_insights.total_claims, 1);
        assert_eq!(insights.claims_insights.risk_level, RiskLevel::Low);
        assert_eq!(insights.profile_insights.active_policies, 1);
        assert_eq!(insights.payment_history.summary.total_payments_made, 3);

        let cached = store.for_customer(customer_id).await.unwrap();
        let types: Vec<_> = cached.iter().map(|r| r.insight_type).collect();
        assert_eq!(
            types,
            vec![
                InsightType::Payment,
                InsightType::Communication,
                InsightType::Claims,
                InsightType::Profile
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let (service, _, _) = service_with(vec![]).await;
        let missing = CustomerId::new();

        let err = service.customer_insights(missing, false).await.unwrap_err();
        assert!(matches!(err, InsightError::CustomerNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_deleted_customer_is_not_found() {
        let mut records = sample_records("Ravi");
        records.customer.is_deleted = true;
        let customer_id = records.customer.id;
        let (service, _, _) = service_with(vec![records]).await;

        let err = service.payment_insights(customer_id, false).await.unwrap_err();
        assert!(matches!(err, InsightError::CustomerNotFound(_)));
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_until_forced() {
        let records = sample_records("Meera");
        let customer_id = records.customer.id;
        let (service, source, _) = service_with(vec![records.clone()]).await;

        let first = service.payment_insights(customer_id, false).await.unwrap();
        assert_eq!(first.total_payments_made, 3);

        let mut updated = records;
        updated.payments.push(paid(customer_id, dec!(500), 1, 5));
        source.insert(updated).await;

        let cached = service.payment_insights(customer_id, false).await.unwrap();
        assert_eq!(cached.total_payments_made, 3);

        let forced = service.payment_insights(customer_id, true).await.unwrap();
        assert_eq!(forced.total_payments_made, 4);
        assert_eq!(forced.total_premiums_paid, dec!(3500));
    }

    #[tokio::test]
    async fn test_expired_cache_is_recomputed() {
        let records = sample_records("Kiran");
        let customer_id = records.customer.id;
        let (_, source, store) = service_with(vec![records.clone()]).await;
        let service = InsightsService::new(source.clone(), store.clone()).with_ttl(Duration::zero());

        service.communication_insights(customer_id, false).await.unwrap();

        let mut updated = records;
        updated.communications.clear();
        source.insert(updated).await;

        let recomputed = service.communication_insights(customer_id, false).await.unwrap();
        assert_eq!(recomputed.total_communications, 0);
    }

    #[tokio::test]
    async fn test_recalculate_keeps_one_record_per_section() {
        let records = sample_records("Dev");
        let customer_id = records.customer.id;
        let (service, _, store) = service_with(vec![records]).await;

        service.customer_insights(customer_id, false).await.unwrap();
        let before = store.get(customer_id, InsightType::Claims).await.unwrap().unwrap();
        service.recalculate(customer_id).await.unwrap();
        let after = store.get(customer_id, InsightType::Claims).await.unwrap().unwrap();

        assert_eq!(before.id, after.id);
        assert!(after.calculated_at >= before.calculated_at);
        assert_eq!(store.for_customer(customer_id).await.unwrap().len(), 4);
    }

    #[test]
    fn test_risk_score_follows_punctuality_not_completion() {
        let punctual = sample_records("Ira");
        assert_eq!(ProfileInsights::compute(&punctual, Utc::now()).overall_risk_score, 40.0);

        // Completed, but each paid well after its due date
        let mut late = sample_records("Om");
        let customer_id = late.customer.id;
        late.payments = vec![
            paid(customer_id, dec!(1000), 80, 100),
            paid(customer_id, dec!(1000), 40, 60),
            paid(customer_id, dec!(1000), 5, 25),
        ];
        assert_eq!(ProfileInsights::compute(&late, Utc::now()).overall_risk_score, 65.0);
    }
}

// ============================================================================
// Histories
// ============================================================================

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn test_claims_history_summary() {
        let mut records = sample_records("Nita");
        let policy_id = records.policies[0].id;
        let mut rejected =
            PolicyClaim::submit(policy_id, ClaimType::Vehicle, dec!(4000), days_ago(20), days_ago(18)).unwrap();
        rejected.reject("Not covered").unwrap();
        records.claims.push(rejected);
        let customer_id = records.customer.id;
        let (service, _, _) = service_with(vec![records]).await;

        let history = service.claims_history(customer_id).await.unwrap();

        assert_eq!(history.summary.total_claims, 2);
        assert_eq!(history.summary.rejected_claims, 1);
        assert_eq!(history.summary.pending_claims, 1);
        assert_eq!(history.claims[0].rejection_reason.as_deref(), Some("Not covered"));
        assert_eq!(history.claims[0].policy, "Motor");
    }

    #[tokio::test]
    async fn test_communication_history_groups_by_channel() {
        let records = sample_records("Omar");
        let customer_id = records.customer.id;
        let (service, _, _) = service_with(vec![records]).await;

        let history = service.communication_history(customer_id).await.unwrap();

        assert_eq!(history.total_communications, 2);
        assert_eq!(history.by_channel["email"].len(), 2);
        assert_eq!(history.recent_communications[0].outcome, CommunicationOutcome::Replied);
    }

    #[tokio::test]
    async fn test_payment_history_rejects_zero_years() {
        let records = sample_records("Lata");
        let customer_id = records.customer.id;
        let (service, _, _) = service_with(vec![records]).await;

        let err = service.payment_history(customer_id, Some(0)).await.unwrap_err();
        assert!(matches!(err, InsightError::Validation(_)));

        let history = service.payment_history(customer_id, None).await.unwrap();
        assert_eq!(history.summary.total_payments_made, 3);
    }
}

// ============================================================================
// Bulk recalculation, summary and dashboard
// ============================================================================

mod aggregate_tests {
    use super::*;

    #[tokio::test]
    async fn test_bulk_recalculate_reports_failures() {
        let records = sample_records("Arun");
        let known = records.customer.id;
        let unknown = CustomerId::new();
        let (service, _, _) = service_with(vec![records]).await;

        let result = service.bulk_recalculate(&[known, unknown], true).await.unwrap();

        assert_eq!(result.total_requested, 2);
        assert_eq!(result.updated_count, 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].customer_id, unknown);
    }

    #[tokio::test]
    async fn test_bulk_recalculate_requires_customers() {
        let (service, _, _) = service_with(vec![]).await;
        let err = service.bulk_recalculate(&[], false).await.unwrap_err();
        assert!(matches!(err, InsightError::Validation(_)));
    }

    #[tokio::test]
    async fn test_summary_filters_and_pages() {
        let first = sample_records("Isha");
        let mut second = sample_records("Vikram");
        second.customer.profile = CustomerProfile::Hni;
        let ids = [first.customer.id, second.customer.id];
        let (service, _, _) = service_with(vec![first, second]).await;
        service.bulk_recalculate(&ids, false).await.unwrap();

        let all = service
            .summary(&InsightFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);

        let filter = InsightFilter {
            customer_segment: Some(CustomerSegment::Hni),
            ..Default::default()
        };
        let none = service.summary(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(none.total, 0);

        let filter = InsightFilter {
            payment_reliability: Some(PaymentReliability::Excellent),
            ..Default::default()
        };
        let paged = service.summary(&filter, PageRequest::new(1, 0)).await.unwrap();
        assert_eq!(paged.total, 2);
        assert_eq!(paged.items.len(), 1);
        assert!(paged.has_more());
    }

    #[tokio::test]
    async fn test_dashboard_aggregates_cached_sections() {
        let first = sample_records("Sana");
        let mut second = sample_records("Rahul");
        second.customer.profile = CustomerProfile::Hni;
        let ids = [first.customer.id, second.customer.id];
        let (service, _, _) = service_with(vec![first, second]).await;

        let empty = service.dashboard().await.unwrap();
        assert_eq!(empty.total_customers, 2);
        assert!(empty.recent_insights.is_empty());

        service.bulk_recalculate(&ids, false).await.unwrap();
        let dashboard = service.dashboard().await.unwrap();

        assert_eq!(dashboard.total_customers, 2);
        assert_eq!(dashboard.high_value_customers, 1);
        assert_eq!(dashboard.customers_with_claims, 2);
        assert_eq!(dashboard.total_premiums_collected, dec!(6000));
        assert_eq!(dashboard.recent_insights.len(), 2);
    }
}
