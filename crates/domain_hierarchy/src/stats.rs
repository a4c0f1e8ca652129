//! Hierarchy statistics

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::unit::HierarchyUnit;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyStats {
    pub total_units: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    /// Keyed by parent unit name, `root` for top-level units
    pub by_parent: BTreeMap<String, u64>,
    pub total_budget: Decimal,
    pub total_target_cases: u64,
}

impl HierarchyStats {
    pub fn compute(units: &[HierarchyUnit]) -> Self {
        let names: HashMap<_, _> = units.iter().map(|u| (u.id, u.unit_name.as_str())).collect();
        let mut stats = HierarchyStats {
            total_units: units.len() as u64,
            ..Default::default()
        };

        for unit in units {
            *stats.by_type.entry(unit.unit_type.to_string()).or_default() += 1;
            *stats.by_status.entry(unit.status.to_string()).or_default() += 1;
            let parent = unit
                .parent_id
                .and_then(|p| names.get(&p).map(|n| n.to_string()))
                .unwrap_or_else(|| "root".to_string());
            *stats.by_parent.entry(parent).or_default() += 1;
            stats.total_budget += unit.budget.unwrap_or_default();
            stats.total_target_cases += u64::from(unit.target_cases);
        }

        stats
    }
}
