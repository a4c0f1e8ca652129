//! Hierarchy units

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{string_enum, HierarchyUnitId};

use crate::error::HierarchyError;

/// Level of a unit in the organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Department,
    Region,
    State,
    Branch,
    Team,
}

string_enum!(UnitType, "unit type", {
    Department => "department",
    Region => "region",
    State => "state",
    Branch => "branch",
    Team => "team",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Inactive,
    Restructuring,
}

string_enum!(UnitStatus, "unit status", {
    Active => "active",
    Inactive => "inactive",
    Restructuring => "restructuring",
});

/// A node of the organisation tree
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HierarchyUnit {
    pub id: HierarchyUnitId,
    #[validate(length(min = 1, max = 200))]
    pub unit_name: String,
    pub unit_type: UnitType,
    pub description: Option<String>,
    /// `None` for root units
    pub parent_id: Option<HierarchyUnitId>,
    pub manager_id: String,
    pub budget: Option<Decimal>,
    pub target_cases: u32,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `mgr-` followed by exactly three digits
pub fn is_valid_manager_id(manager_id: &str) -> bool {
    manager_id
        .strip_prefix("mgr-")
        .map(|digits| digits.len() == 3 && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

impl HierarchyUnit {
    pub fn new(
        unit_name: impl Into<String>,
        unit_type: UnitType,
        manager_id: impl Into<String>,
    ) -> Result<Self, HierarchyError> {
        let unit_name = unit_name.into();
        if unit_name.trim().is_empty() {
            return Err(HierarchyError::Validation("unit name is required".into()));
        }
        let manager_id = manager_id.into();
        if !is_valid_manager_id(&manager_id) {
            return Err(HierarchyError::InvalidManagerId(manager_id));
        }
        let now = Utc::now();
        Ok(Self {
            id: HierarchyUnitId::new_v7(),
            unit_name,
            unit_type,
            description: None,
            parent_id: None,
            manager_id,
            budget: None,
            target_cases: 0,
            status: UnitStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn under(mut self, parent: HierarchyUnitId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_budget(mut self, budget: Decimal) -> Result<Self, HierarchyError> {
        if budget.is_sign_negative() {
            return Err(HierarchyError::Validation("budget cannot be negative".into()));
        }
        self.budget = Some(budget);
        Ok(self)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl std::fmt::Display for HierarchyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.unit_type, self.unit_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_manager_id_format() {
        assert!(is_valid_manager_id("mgr-002"));
        assert!(!is_valid_manager_id("mgr-02"));
        assert!(!is_valid_manager_id("MGR-002"));
        assert!(!is_valid_manager_id("mgr-0021"));
        assert!(!is_valid_manager_id("mgr-a12"));
    }

    #[test]
    fn test_negative_budget_rejected() {
        let unit = HierarchyUnit::new("North", UnitType::Region, "mgr-001").unwrap();
        assert!(unit.with_budget(dec!(-5)).is_err());
    }

    #[test]
    fn test_display() {
        let unit = HierarchyUnit::new("Renewals", UnitType::Department, "mgr-001").unwrap();
        assert_eq!(unit.to_string(), "department: Renewals");
    }
}
