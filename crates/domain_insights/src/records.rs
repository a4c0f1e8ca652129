//! Everything loaded for one customer

use std::collections::HashMap;

use core_kernel::{PolicyId, PolicyTypeId, RenewalCaseId};
use domain_customer::{CommunicationLog, Customer};
use domain_policy::{Policy, PolicyClaim};
use domain_renewal::{CustomerPayment, Installment, RenewalCase};

/// A customer's records as the calculators see them
///
/// Sources return only non-deleted rows; the calculators still skip rows
/// flagged deleted so a bundle built by hand behaves the same way.
#[derive(Debug, Clone)]
pub struct CustomerRecords {
    pub customer: Customer,
    pub policies: Vec<Policy>,
    pub policy_type_names: HashMap<PolicyTypeId, String>,
    pub payments: Vec<CustomerPayment>,
    pub communications: Vec<CommunicationLog>,
    pub claims: Vec<PolicyClaim>,
    pub cases: Vec<RenewalCase>,
    pub installments: Vec<Installment>,
}

impl CustomerRecords {
    pub fn new(customer: Customer) -> Self {
        Self {
            customer,
            policies: Vec::new(),
            policy_type_names: HashMap::new(),
            payments: Vec::new(),
            communications: Vec::new(),
            claims: Vec::new(),
            cases: Vec::new(),
            installments: Vec::new(),
        }
    }

    pub fn live_payments(&self) -> impl Iterator<Item = &CustomerPayment> {
        self.payments.iter().filter(|p| !p.is_deleted)
    }

    pub fn live_communications(&self) -> impl Iterator<Item = &CommunicationLog> {
        self.communications.iter().filter(|c| !c.is_deleted)
    }

    pub fn live_policies(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter().filter(|p| !p.is_deleted)
    }

    /// Name of the policy's type, or "Unknown"
    pub fn policy_type_name(&self, policy_id: PolicyId) -> String {
        self.policies
            .iter()
            .find(|p| p.id == policy_id)
            .and_then(|p| self.policy_type_names.get(&p.policy_type_id))
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Policy type name for the policy behind a renewal case
    pub fn case_policy_type_name(&self, case_id: RenewalCaseId) -> String {
        self.cases
            .iter()
            .find(|c| c.id == case_id)
            .map(|c| self.policy_type_name(c.policy_id))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
