//! Test Data Builders
//!
//! Builders for domain records with sensible defaults, so a test names only
//! the fields it cares about. Each `build` goes through the domain
//! constructor and then overrides fields directly, which keeps the
//! constructors' invariants while letting tests reach odd states.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{CustomerId, HierarchyUnitId, PolicyId, PolicyTypeId, RenewalCaseId};
use rust_decimal::Decimal;

use domain_customer::{Customer, CustomerProfile, CustomerStatus};
use domain_hierarchy::{HierarchyUnit, UnitStatus, UnitType};
use domain_messaging::{EmailProviderConfig, ProviderType};
use domain_policy::{PaymentFrequency, Policy, PolicyStatus, PolicyType};
use domain_renewal::{CustomerPayment, PaymentMode, PaymentStatus, RenewalCase, RenewalStatus};

use crate::fixtures::{AmountFixtures, IdFixtures, StringFixtures, TemporalFixtures};

/// Builder for customers
pub struct CustomerBuilder {
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    status: CustomerStatus,
    profile: CustomerProfile,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    pub fn new() -> Self {
        Self {
            first_name: StringFixtures::first_name().to_string(),
            last_name: StringFixtures::last_name().to_string(),
            email: Some(StringFixtures::email().to_string()),
            phone: Some(StringFixtures::phone().to_string()),
            status: CustomerStatus::Active,
            profile: CustomerProfile::Normal,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = first.into();
        self.last_name = last.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn without_contact(mut self) -> Self {
        self.email = None;
        self.phone = None;
        self
    }

    pub fn with_status(mut self, status: CustomerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn hni(mut self) -> Self {
        self.profile = CustomerProfile::Hni;
        self
    }

    pub fn build(self) -> Customer {
        let mut customer = Customer::new(self.first_name, self.last_name);
        customer.email = self.email;
        customer.phone = self.phone;
        customer.status = self.status;
        customer.profile = self.profile;
        customer
    }
}

/// Builder for policies
///
/// Defaults to the standard one-year yearly-pay term of [`TemporalFixtures`].
pub struct PolicyBuilder {
    policy_number: String,
    customer_id: CustomerId,
    policy_type_id: PolicyTypeId,
    start_date: NaiveDate,
    end_date: NaiveDate,
    premium: Decimal,
    sum_assured: Decimal,
    frequency: PaymentFrequency,
    status: PolicyStatus,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy_number: StringFixtures::policy_number().to_string(),
            customer_id: IdFixtures::customer_id(),
            policy_type_id: IdFixtures::policy_type_id(),
            start_date: TemporalFixtures::policy_start(),
            end_date: TemporalFixtures::policy_end(),
            premium: AmountFixtures::premium(),
            sum_assured: AmountFixtures::sum_assured(),
            frequency: PaymentFrequency::Yearly,
            status: PolicyStatus::Active,
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn of_type(mut self, policy_type_id: PolicyTypeId) -> Self {
        self.policy_type_id = policy_type_id;
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.policy_number = number.into();
        self
    }

    pub fn with_term(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_premium(mut self, premium: Decimal) -> Self {
        self.premium = premium;
        self
    }

    pub fn with_frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_status(mut self, status: PolicyStatus) -> Self {
        self.status = status;
        self
    }

    /// # Panics
    ///
    /// Panics if the dates or amounts are rejected by [`Policy::new`]
    pub fn build(self) -> Policy {
        let mut policy = Policy::new(
            self.policy_number,
            self.customer_id,
            self.policy_type_id,
            self.start_date,
            self.end_date,
            self.premium,
            self.sum_assured,
        )
        .expect("policy builder produced an invalid policy")
        .with_frequency(self.frequency);
        policy.status = self.status;
        policy
    }
}

/// Standard active policy type
pub fn policy_type() -> PolicyType {
    PolicyType::new("Term Life", StringFixtures::policy_type_code(), AmountFixtures::base_rate())
        .expect("fixture policy type is valid")
}

/// Builder for renewal cases
pub struct RenewalCaseBuilder {
    policy_id: PolicyId,
    customer_id: CustomerId,
    batch_code: String,
    amount: Decimal,
    status: RenewalStatus,
    assigned_to: Option<String>,
}

impl Default for RenewalCaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenewalCaseBuilder {
    pub fn new() -> Self {
        Self {
            policy_id: IdFixtures::policy_id(),
            customer_id: IdFixtures::customer_id(),
            batch_code: StringFixtures::batch_code().to_string(),
            amount: AmountFixtures::premium(),
            status: RenewalStatus::Pending,
            assigned_to: None,
        }
    }

    /// Takes policy, customer and amount from an existing policy
    pub fn for_policy(mut self, policy: &Policy) -> Self {
        self.policy_id = policy.id;
        self.customer_id = policy.customer_id;
        self.amount = policy.premium_amount;
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_status(mut self, status: RenewalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn assigned_to(mut self, user: impl Into<String>) -> Self {
        self.assigned_to = Some(user.into());
        self
    }

    pub fn build(self) -> RenewalCase {
        let mut case = RenewalCase::open(self.policy_id, self.customer_id, self.batch_code, self.amount)
            .expect("renewal case builder produced an invalid case");
        case.status = self.status;
        case.assigned_to = self.assigned_to;
        case
    }
}

/// Builder for customer payments
pub struct PaymentBuilder {
    customer_id: CustomerId,
    case_id: Option<RenewalCaseId>,
    amount: Decimal,
    payment_date: DateTime<Utc>,
    due_date: NaiveDate,
    mode: PaymentMode,
    status: PaymentStatus,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self {
            customer_id: IdFixtures::customer_id(),
            case_id: None,
            amount: AmountFixtures::premium(),
            payment_date: TemporalFixtures::payment_time(),
            due_date: TemporalFixtures::policy_end(),
            mode: PaymentMode::Upi,
            status: PaymentStatus::Pending,
        }
    }

    /// Pays against a case, taking the case's customer and amount
    pub fn for_case(mut self, case: &RenewalCase) -> Self {
        self.customer_id = case.customer_id;
        self.case_id = Some(case.id);
        self.amount = case.renewal_amount;
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn paid_at(mut self, at: DateTime<Utc>) -> Self {
        self.payment_date = at;
        self
    }

    pub fn completed(mut self) -> Self {
        self.status = PaymentStatus::Completed;
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> CustomerPayment {
        let payment = CustomerPayment::new(
            self.customer_id,
            self.amount,
            self.payment_date,
            self.due_date,
            self.mode,
        )
        .expect("payment builder produced an invalid payment")
        .with_status(self.status);
        match self.case_id {
            Some(case_id) => payment.for_case(case_id),
            None => payment,
        }
    }
}

/// Builder for hierarchy units
pub struct HierarchyUnitBuilder {
    name: String,
    unit_type: UnitType,
    manager_id: String,
    parent_id: Option<HierarchyUnitId>,
    target_cases: u32,
    status: UnitStatus,
}

impl HierarchyUnitBuilder {
    pub fn new(name: impl Into<String>, unit_type: UnitType) -> Self {
        Self {
            name: name.into(),
            unit_type,
            manager_id: StringFixtures::manager_id().to_string(),
            parent_id: None,
            target_cases: 0,
            status: UnitStatus::Active,
        }
    }

    pub fn under(mut self, parent: HierarchyUnitId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_manager(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = manager_id.into();
        self
    }

    pub fn with_target(mut self, target_cases: u32) -> Self {
        self.target_cases = target_cases;
        self
    }

    pub fn with_status(mut self, status: UnitStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> HierarchyUnit {
        let mut unit = HierarchyUnit::new(self.name, self.unit_type, self.manager_id)
            .expect("hierarchy builder produced an invalid unit");
        unit.parent_id = self.parent_id;
        unit.target_cases = self.target_cases;
        unit.status = self.status;
        unit
    }
}

/// Builder for email providers
pub struct ProviderBuilder {
    name: String,
    provider_type: ProviderType,
    priority: u32,
    is_default: bool,
    is_active: bool,
    daily_limit: u32,
}

impl ProviderBuilder {
    pub fn new(name: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            name: name.into(),
            provider_type,
            priority: 1,
            is_default: false,
            is_active: true,
            daily_limit: 10_000,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn default_provider(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    pub fn build(self) -> EmailProviderConfig {
        let mut provider = EmailProviderConfig::new(self.name, self.provider_type, StringFixtures::sender())
            .with_priority(self.priority);
        provider.is_default = self.is_default;
        provider.is_active = self.is_active;
        provider.daily_limit = self.daily_limit;
        if self.provider_type == ProviderType::Smtp {
            provider.smtp_host = Some("smtp.example.com".to_string());
            provider.smtp_username = Some("mailer".to_string());
        }
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_policy_builder_defaults() {
        let policy = PolicyBuilder::new().build();
        assert_eq!(policy.policy_number, StringFixtures::policy_number());
        assert_eq!(policy.premium_amount, AmountFixtures::premium());
        assert_eq!(policy.payment_frequency, PaymentFrequency::Yearly);
        assert!(policy.is_due_for_renewal(TemporalFixtures::in_renewal_window()));
        assert!(!policy.is_due_for_renewal(TemporalFixtures::before_renewal_window()));
    }

    #[test]
    fn test_case_builder_follows_policy() {
        let policy = PolicyBuilder::new().with_premium(dec!(800)).build();
        let case = RenewalCaseBuilder::new().for_policy(&policy).assigned_to("agent-7").build();

        assert_eq!(case.policy_id, policy.id);
        assert_eq!(case.customer_id, policy.customer_id);
        assert_eq!(case.renewal_amount, dec!(800));
        assert_eq!(case.assigned_to.as_deref(), Some("agent-7"));
    }

    #[test]
    fn test_payment_builder_links_case() {
        let case = RenewalCaseBuilder::new().build();
        let payment = PaymentBuilder::new().for_case(&case).completed().build();

        assert_eq!(payment.renewal_case_id, Some(case.id));
        assert_eq!(payment.customer_id, case.customer_id);
        assert!(payment.is_completed());
    }

    #[test]
    fn test_hierarchy_builder_parent() {
        let region = HierarchyUnitBuilder::new("North", UnitType::Region).build();
        let branch = HierarchyUnitBuilder::new("Delhi", UnitType::Branch)
            .under(region.id)
            .with_target(40)
            .build();

        assert!(region.is_root());
        assert_eq!(branch.parent_id, Some(region.id));
        assert_eq!(branch.target_cases, 40);
    }

    #[test]
    fn test_provider_builder_smtp_host() {
        let smtp = ProviderBuilder::new("relay", ProviderType::Smtp).default_provider().build();
        assert!(smtp.is_default);
        assert!(smtp.smtp_host.is_some());

        let sendgrid = ProviderBuilder::new("sg", ProviderType::Sendgrid).with_priority(2).build();
        assert_eq!(sendgrid.priority, 2);
        assert!(sendgrid.smtp_host.is_none());
    }
}
