//! Customer insight DTOs

use serde::Deserialize;
use validator::Validate;

use core_kernel::CustomerId;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Span in years, 1 to 50
    pub years: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkRecalculateRequest {
    #[validate(length(min = 1, max = 500))]
    pub customer_ids: Vec<CustomerId>,
    #[serde(default)]
    pub force_refresh: bool,
}
