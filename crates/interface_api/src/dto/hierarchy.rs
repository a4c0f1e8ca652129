//! Organisation hierarchy DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::HierarchyUnitId;
use domain_hierarchy::{UnitStatus, UnitType};

#[derive(Debug, Default, Deserialize)]
pub struct HierarchyQuery {
    pub unit_type: Option<UnitType>,
    pub status: Option<UnitStatus>,
    pub parent_id: Option<HierarchyUnitId>,
    #[serde(default)]
    pub roots_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitRequest {
    #[validate(length(min = 1, max = 200))]
    pub unit_name: String,
    pub unit_type: UnitType,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub parent_id: Option<HierarchyUnitId>,
    pub manager_id: String,
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub target_cases: u32,
    pub status: Option<UnitStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUnitRequest {
    #[validate(length(min = 1, max = 200))]
    pub unit_name: Option<String>,
    pub unit_type: Option<UnitType>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    /// `null` makes the unit a root
    #[serde(default, deserialize_with = "crate::dto::double_option")]
    pub parent_id: Option<Option<HierarchyUnitId>>,
    pub manager_id: Option<String>,
    pub budget: Option<Decimal>,
    pub target_cases: Option<u32>,
    pub status: Option<UnitStatus>,
}
