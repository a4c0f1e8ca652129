//! Customer and metrics DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::CustomerId;
use domain_customer::{CustomerPriority, CustomerProfile, CustomerStatus, MetricsUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub profile: Option<CustomerProfile>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub priority: Option<CustomerPriority>,
    pub profile: Option<CustomerProfile>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 50))]
    pub customer_code: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub priority: Option<CustomerPriority>,
    pub profile: Option<CustomerProfile>,
}

#[derive(Debug, Serialize)]
pub struct MetricsChange {
    pub customer_id: CustomerId,
    pub old_count: u32,
    pub new_count: u32,
}

#[derive(Debug, Serialize)]
pub struct RefreshMetricsResponse {
    pub updated: usize,
    pub changes: Vec<MetricsChange>,
}

impl From<Vec<(CustomerId, MetricsUpdate)>> for RefreshMetricsResponse {
    fn from(changed: Vec<(CustomerId, MetricsUpdate)>) -> Self {
        let changes: Vec<_> = changed
            .into_iter()
            .map(|(customer_id, update)| MetricsChange {
                customer_id,
                old_count: update.old_count,
                new_count: update.new_count,
            })
            .collect();
        Self {
            updated: changes.len(),
            changes,
        }
    }
}
