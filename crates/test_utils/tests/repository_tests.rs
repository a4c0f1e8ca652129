//! Repository tests against a migrated PostgreSQL container
//!
//! Ignored by default; run with `cargo test -p test_utils -- --ignored`
//! on a machine with Docker.

use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use sqlx::PgPool;

use domain_campaign::{
    Audience, Campaign, CampaignChannel, CampaignRecipient, CampaignStore, DeliveryStatus,
    EmailTemplate, TemplateFilter, TemplateType,
};
use domain_customer::{CommunicationChannel, CommunicationLog, CommunicationOutcome, Customer};
use domain_hierarchy::{check_unique, ensure_no_cycle, HierarchyError, HierarchyUnit, UnitType};
use domain_messaging::{ProviderStore, ProviderType, Reservation};
use domain_policy::{PaymentFrequency, PolicyType};
use domain_renewal::{
    plan_installments, InstallmentStatus, PaymentStatus, RenewalCase, RenewalPaymentStatus,
};
use infra_db::{
    CommunicationRepository, CustomerRepository, DatabaseError, HierarchyRepository,
    PaymentRepository, PolicyRepository, PostgresCampaignStore, PostgresProviderStore,
    RenewalRepository,
};
use test_utils::{
    assert_installment_count, assert_installments_sum, db_test, policy_type, CustomerBuilder,
    HierarchyUnitBuilder, PaymentBuilder, PolicyBuilder, ProviderBuilder, RenewalCaseBuilder,
};

/// Caller-side error for the checked hierarchy writes
#[derive(Debug, thiserror::Error)]
enum CheckedWriteError {
    #[error(transparent)]
    Rule(#[from] HierarchyError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Stores a quarterly policy due in two weeks and opens its case with a
/// four-installment schedule
async fn open_case(pool: &PgPool, customer: &Customer, policy_type: &PolicyType, number: &str) -> RenewalCase {
    let today = Utc::now().date_naive();
    let policy = PolicyBuilder::new()
        .for_customer(customer.id)
        .of_type(policy_type.id)
        .with_number(number)
        .with_term(today - Duration::days(350), today + Duration::days(15))
        .with_premium(dec!(1000))
        .with_frequency(PaymentFrequency::Quarterly)
        .build();
    PolicyRepository::new(pool.clone()).create(&policy).await.unwrap();

    let case = RenewalCaseBuilder::new().for_policy(&policy).build();
    let plan = plan_installments(&policy, &case, policy.end_date).unwrap();
    RenewalRepository::new(pool.clone()).create(&case, &plan).await.unwrap();
    case
}

fn log_at(customer: &Customer, at: DateTime<Utc>, content: &str) -> CommunicationLog {
    CommunicationLog::new(
        customer.id,
        CommunicationChannel::Email,
        at,
        CommunicationOutcome::Delivered,
        content,
    )
}

db_test!(policy_writes_refresh_customer_metrics, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let policies = PolicyRepository::new(pool.clone());

    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let policy_type = policies.create_type(&policy_type()).await.unwrap();
    let policy = PolicyBuilder::new()
        .for_customer(customer.id)
        .of_type(policy_type.id)
        .with_premium(dec!(4500))
        .build();
    policies.create(&policy).await.unwrap();

    let update = customers.refresh_metrics(customer.id).await.unwrap();
    assert_eq!((update.old_count, update.new_count), (0, 1));

    let refreshed = customers.get(customer.id).await.unwrap();
    assert_eq!(refreshed.total_policies, 1);
    assert_eq!(refreshed.total_premium, dec!(4500));
    assert_eq!(refreshed.first_policy_date, Some(policy.start_date));
});

db_test!(completed_payment_settles_case_and_installment, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let policies = PolicyRepository::new(pool.clone());
    let renewals = RenewalRepository::new(pool.clone());
    let payments = PaymentRepository::new(pool.clone());

    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let policy_type = policies.create_type(&policy_type()).await.unwrap();
    let today = Utc::now().date_naive();
    let policy = PolicyBuilder::new()
        .for_customer(customer.id)
        .of_type(policy_type.id)
        .with_term(today - Duration::days(350), today + Duration::days(15))
        .with_premium(dec!(1000))
        .with_frequency(PaymentFrequency::Quarterly)
        .build();
    policies.create(&policy).await.unwrap();

    let case = RenewalCaseBuilder::new().for_policy(&policy).build();
    let plan = plan_installments(&policy, &case, policy.end_date).unwrap();
    assert_installments_sum(&plan, dec!(1000));
    renewals.create(&case, &plan).await.unwrap();

    let payment = PaymentBuilder::new()
        .for_case(&case)
        .with_amount(dec!(250))
        .paid_at(Utc::now())
        .completed()
        .build();
    payments.create(&payment).await.unwrap();

    let stored = renewals.get(case.id).await.unwrap();
    assert_eq!(stored.payment_status, RenewalPaymentStatus::Success);
    assert!(stored.payment_date.is_some());

    let installments = renewals.installments(case.id).await.unwrap();
    assert_installment_count(&installments, InstallmentStatus::Paid, 1);
    assert_eq!(installments[0].payment_id, Some(payment.id));

    payments.soft_delete(payment.id).await.unwrap();
    let stored = renewals.get(case.id).await.unwrap();
    assert_eq!(stored.payment_status, RenewalPaymentStatus::Pending);
    let installments = renewals.installments(case.id).await.unwrap();
    assert_installment_count(&installments, InstallmentStatus::Paid, 0);
});

db_test!(deleted_log_no_longer_counts_as_contact, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let logs = CommunicationRepository::new(pool.clone());
    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();

    let earlier = Utc::now() - Duration::days(3);
    let later = Utc::now() - Duration::days(1);
    let first = CommunicationLog::new(
        customer.id,
        CommunicationChannel::Email,
        earlier,
        CommunicationOutcome::Successful,
        "Renewal reminder",
    );
    let second = CommunicationLog::new(
        customer.id,
        CommunicationChannel::Phone,
        later,
        CommunicationOutcome::Successful,
        "Follow-up call",
    );
    logs.create(&first).await.unwrap();
    logs.create(&second).await.unwrap();

    let contact = customers.get(customer.id).await.unwrap().last_contact_date.unwrap();
    assert_eq!(contact.timestamp_micros(), later.timestamp_micros());

    logs.soft_delete(second.id).await.unwrap();
    let contact = customers.get(customer.id).await.unwrap().last_contact_date.unwrap();
    assert_eq!(contact.timestamp_micros(), earlier.timestamp_micros());
});

db_test!(unit_with_children_cannot_be_deleted, |pool| {
    let units = HierarchyRepository::new(pool.clone());
    let region = units
        .create(&HierarchyUnitBuilder::new("North", UnitType::Region).build())
        .await
        .unwrap();
    let branch = units
        .create(
            &HierarchyUnitBuilder::new("Delhi", UnitType::Branch)
                .with_manager("mgr-002")
                .under(region.id)
                .build(),
        )
        .await
        .unwrap();

    let err = units.delete(region.id).await.unwrap_err();
    assert!(matches!(err, DatabaseError::ForeignKeyViolation(_)));

    units.delete(branch.id).await.unwrap();
    units.delete(region.id).await.unwrap();
    assert!(units.get(region.id).await.unwrap_err().is_not_found());
});

db_test!(checked_reparent_rejects_a_cycle_under_lock, |pool| {
    let units = HierarchyRepository::new(pool.clone());
    let region = units
        .create(&HierarchyUnitBuilder::new("North", UnitType::Region).build())
        .await
        .unwrap();
    let branch = units
        .create(
            &HierarchyUnitBuilder::new("Delhi", UnitType::Branch)
                .with_manager("mgr-002")
                .under(region.id)
                .build(),
        )
        .await
        .unwrap();

    let err = units
        .update_checked(region.id, |all, mut unit| -> Result<HierarchyUnit, CheckedWriteError> {
            ensure_no_cycle(all, unit.id, Some(branch.id))?;
            unit.parent_id = Some(branch.id);
            Ok(unit)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CheckedWriteError::Rule(HierarchyError::Cycle { .. })));
    assert_eq!(units.get(region.id).await.unwrap().parent_id, None);

    let renamed = units
        .update_checked(branch.id, |all, mut unit| -> Result<HierarchyUnit, CheckedWriteError> {
            unit.unit_name = "New Delhi".into();
            check_unique(all, &unit)?;
            Ok(unit)
        })
        .await
        .unwrap();
    assert_eq!(renamed.unit_name, "New Delhi");
    assert_eq!(renamed.parent_id, Some(region.id));
});

db_test!(checked_create_sees_existing_managers, |pool| {
    let units = HierarchyRepository::new(pool.clone());
    units
        .create(&HierarchyUnitBuilder::new("North", UnitType::Region).build())
        .await
        .unwrap();

    let err = units
        .create_checked(|all| -> Result<HierarchyUnit, CheckedWriteError> {
            let unit = HierarchyUnitBuilder::new("South", UnitType::Region).build();
            check_unique(all, &unit)?;
            Ok(unit)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CheckedWriteError::Rule(HierarchyError::DuplicateManager(_))));
    assert_eq!(units.all().await.unwrap().len(), 1);
});

db_test!(payment_moved_between_cases_resyncs_both, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let renewals = RenewalRepository::new(pool.clone());
    let payments = PaymentRepository::new(pool.clone());

    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let policy_type = PolicyRepository::new(pool.clone()).create_type(&policy_type()).await.unwrap();
    let first = open_case(&pool, &customer, &policy_type, "POL-MOVE-1").await;
    let second = open_case(&pool, &customer, &policy_type, "POL-MOVE-2").await;

    let payment = PaymentBuilder::new()
        .for_case(&first)
        .with_amount(dec!(250))
        .paid_at(Utc::now())
        .completed()
        .build();
    payments.create(&payment).await.unwrap();
    assert_eq!(renewals.get(first.id).await.unwrap().payment_status, RenewalPaymentStatus::Success);

    let mut moved = payment.clone();
    moved.renewal_case_id = Some(second.id);
    payments.update(&moved).await.unwrap();

    let left = renewals.get(first.id).await.unwrap();
    assert_eq!(left.payment_status, RenewalPaymentStatus::Pending);
    assert_installment_count(&renewals.installments(first.id).await.unwrap(), InstallmentStatus::Paid, 0);

    let joined = renewals.get(second.id).await.unwrap();
    assert_eq!(joined.payment_status, RenewalPaymentStatus::Success);
    let installments = renewals.installments(second.id).await.unwrap();
    assert_installment_count(&installments, InstallmentStatus::Paid, 1);
    assert_eq!(installments[0].payment_id, Some(payment.id));
});

db_test!(purged_payments_fall_back_to_the_remaining_ones, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let renewals = RenewalRepository::new(pool.clone());
    let payments = PaymentRepository::new(pool.clone());

    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let policy_type = PolicyRepository::new(pool.clone()).create_type(&policy_type()).await.unwrap();
    let case = open_case(&pool, &customer, &policy_type, "POL-PURGE-1").await;

    let paid = PaymentBuilder::new()
        .for_case(&case)
        .with_amount(dec!(250))
        .paid_at(Utc::now() - Duration::days(2))
        .completed()
        .build();
    let bounced = PaymentBuilder::new()
        .for_case(&case)
        .with_amount(dec!(250))
        .paid_at(Utc::now() - Duration::days(1))
        .with_status(PaymentStatus::Failed)
        .build();
    payments.create(&paid).await.unwrap();
    payments.create(&bounced).await.unwrap();
    assert_eq!(renewals.get(case.id).await.unwrap().payment_status, RenewalPaymentStatus::Failed);

    payments.delete(bounced.id).await.unwrap();
    assert!(payments.get(bounced.id).await.unwrap_err().is_not_found());
    assert_eq!(renewals.get(case.id).await.unwrap().payment_status, RenewalPaymentStatus::Success);
    assert_installment_count(&renewals.installments(case.id).await.unwrap(), InstallmentStatus::Paid, 1);

    payments.delete(paid.id).await.unwrap();
    let stored = renewals.get(case.id).await.unwrap();
    assert_eq!(stored.payment_status, RenewalPaymentStatus::Pending);
    assert_installment_count(&renewals.installments(case.id).await.unwrap(), InstallmentStatus::Paid, 0);
});

db_test!(log_moved_to_another_customer_recomputes_both, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let logs = CommunicationRepository::new(pool.clone());
    let giver = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let taker = customers
        .create(&CustomerBuilder::new().with_name("Meera", "Iyer").build())
        .await
        .unwrap();

    let earlier = Utc::now() - Duration::days(5);
    let later = Utc::now() - Duration::days(1);
    let kept = log_at(&giver, earlier, "Renewal notice");
    let moved = log_at(&giver, later, "Premium reminder");
    logs.create(&kept).await.unwrap();
    logs.create(&moved).await.unwrap();

    let mut reassigned = moved.clone();
    reassigned.customer_id = taker.id;
    logs.update(&reassigned).await.unwrap();

    let giver_contact = customers.get(giver.id).await.unwrap().last_contact_date.unwrap();
    assert_eq!(giver_contact.timestamp_micros(), earlier.timestamp_micros());
    let taker_contact = customers.get(taker.id).await.unwrap().last_contact_date.unwrap();
    assert_eq!(taker_contact.timestamp_micros(), later.timestamp_micros());
});

db_test!(purged_log_clears_last_contact, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let logs = CommunicationRepository::new(pool.clone());
    let customer = customers.create(&CustomerBuilder::new().build()).await.unwrap();

    let only = log_at(&customer, Utc::now() - Duration::hours(3), "Welcome call summary");
    logs.create(&only).await.unwrap();
    assert!(customers.get(customer.id).await.unwrap().last_contact_date.is_some());

    logs.delete(only.id).await.unwrap();
    assert!(logs.get(only.id).await.unwrap_err().is_not_found());
    assert_eq!(customers.get(customer.id).await.unwrap().last_contact_date, None);
});

db_test!(provider_reservations_are_serialised, |pool| {
    let store = PostgresProviderStore::new(pool.clone());
    let provider = store
        .create_provider(ProviderBuilder::new("Capped", ProviderType::Sendgrid).with_daily_limit(1).build())
        .await
        .unwrap();

    let now = Utc::now();
    let (a, b) = tokio::join!(store.reserve_send(provider.id, now), store.reserve_send(provider.id, now));
    let reserved = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|r| matches!(r, Reservation::Reserved(_)))
        .count();
    assert_eq!(reserved, 1);
    assert_eq!(store.get_provider(provider.id).await.unwrap().emails_sent_today, 1);

    store.complete_send(provider.id, false, 120, Utc::now()).await.unwrap();
    let released = store.get_provider(provider.id).await.unwrap();
    assert_eq!(released.emails_sent_today, 0);
    assert_eq!(released.total_emails_failed, 1);
});

db_test!(expired_audience_skips_current_policies, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let policies = PolicyRepository::new(pool.clone());
    let store = PostgresCampaignStore::new(pool.clone());
    let today = Utc::now().date_naive();

    let lapsed = customers.create(&CustomerBuilder::new().with_name("Asha", "Rao").build()).await.unwrap();
    let current = customers.create(&CustomerBuilder::new().build()).await.unwrap();
    let policy_type = policies.create_type(&policy_type()).await.unwrap();
    let expired = PolicyBuilder::new()
        .for_customer(lapsed.id)
        .of_type(policy_type.id)
        .with_number("POL-EXP-1")
        .with_term(today - Duration::days(400), today - Duration::days(35))
        .build();
    policies.create(&expired).await.unwrap();
    let active = PolicyBuilder::new()
        .for_customer(current.id)
        .of_type(policy_type.id)
        .with_number("POL-ACT-1")
        .with_term(today - Duration::days(30), today + Duration::days(335))
        .build();
    policies.create(&active).await.unwrap();

    let members = store.audience_members(Audience::ExpiredPolicies).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].customer_id, lapsed.id);
    assert_eq!(members[0].policy_id, Some(expired.id));
    assert_eq!(store.audience_members(Audience::AllCustomers).await.unwrap().len(), 2);
});

db_test!(campaign_recipients_are_claimed_once, |pool| {
    let customers = CustomerRepository::new(pool.clone());
    let store = PostgresCampaignStore::new(pool.clone());

    let customer = customers
        .create(&CustomerBuilder::new().with_name("Asha", "Rao").with_email("asha@example.com").build())
        .await
        .unwrap();
    let template = EmailTemplate::new("Reminder", "Renew now", TemplateType::RenewalReminder, "<p>Hi</p>")
        .unwrap()
        .activate();
    let template = store.create_template(template).await.unwrap();
    let campaign = store
        .create_campaign(
            Campaign::new("Renewals", vec![CampaignChannel::Email, CampaignChannel::Sms], "agent-1")
                .unwrap()
                .with_template(template.id),
        )
        .await
        .unwrap();
    assert_eq!(store.get_campaign(campaign.id).await.unwrap().channels.len(), 2);

    let recipient = CampaignRecipient::new(campaign.id, customer.id, None);
    let duplicate = CampaignRecipient::new(campaign.id, customer.id, None);
    assert_eq!(store.add_recipients(vec![recipient.clone(), duplicate]).await.unwrap(), 1);

    let (a, b) = tokio::join!(store.claim_pending(campaign.id), store.claim_pending(campaign.id));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.len() + b.len(), 1);
    let claimed = a.into_iter().chain(b).next().unwrap();
    assert_eq!(claimed.recipient.email_status, DeliveryStatus::Queued);
    assert_eq!(claimed.contact.customer_name, "Asha Rao");
    assert_eq!(claimed.contact.email.as_deref(), Some("asha@example.com"));

    let mut sent = claimed.recipient;
    sent.mark_sent(Utc::now());
    store.save_recipient(&sent).await.unwrap();
    sent.mark_clicked(Utc::now());
    store.save_recipient(&sent).await.unwrap();
    let tracked = store.recipient_by_tracking_id(&recipient.tracking_id).await.unwrap();
    assert!(tracked.email_clicked_at.is_some());
    assert_eq!(tracked.email_status, DeliveryStatus::Delivered);

    store.record_template_use(template.id, Utc::now()).await.unwrap();
    let filter = TemplateFilter {
        template_type: Some(TemplateType::RenewalReminder),
        search: Some("remind".into()),
        ..Default::default()
    };
    let listed = store.list_templates(&filter).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].usage_count, 1);
});
