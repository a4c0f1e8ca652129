//! Tree structure rules and assembly

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use core_kernel::HierarchyUnitId;

use crate::error::HierarchyError;
use crate::unit::HierarchyUnit;

/// A unit with its children, for tree views
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub unit: HierarchyUnit,
    pub children: Vec<HierarchyNode>,
}

/// Rejects a parent assignment that would make `unit_id` its own ancestor
pub fn ensure_no_cycle(
    units: &[HierarchyUnit],
    unit_id: HierarchyUnitId,
    new_parent: Option<HierarchyUnitId>,
) -> Result<(), HierarchyError> {
    let Some(start) = new_parent else {
        return Ok(());
    };
    let parents: HashMap<HierarchyUnitId, Option<HierarchyUnitId>> =
        units.iter().map(|u| (u.id, u.parent_id)).collect();

    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if current == unit_id {
            return Err(HierarchyError::Cycle {
                unit: unit_id.to_string(),
                parent: start.to_string(),
            });
        }
        if !seen.insert(current) {
            break;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    Ok(())
}

/// Checks the name/type/parent triple and the manager id against existing units
pub fn check_unique(units: &[HierarchyUnit], candidate: &HierarchyUnit) -> Result<(), HierarchyError> {
    for other in units.iter().filter(|u| u.id != candidate.id) {
        if other.manager_id == candidate.manager_id {
            return Err(HierarchyError::DuplicateManager(candidate.manager_id.clone()));
        }
        if other.unit_type == candidate.unit_type
            && other.parent_id == candidate.parent_id
            && other.unit_name.eq_ignore_ascii_case(&candidate.unit_name)
        {
            return Err(HierarchyError::DuplicateUnit {
                name: candidate.unit_name.clone(),
                unit_type: candidate.unit_type.to_string(),
            });
        }
    }
    Ok(())
}

/// Assembles the units into a forest ordered by type then name
///
/// Units whose parent is missing from `units` are treated as roots.
pub fn build_tree(units: &[HierarchyUnit]) -> Vec<HierarchyNode> {
    let ids: HashSet<HierarchyUnitId> = units.iter().map(|u| u.id).collect();
    let mut children: HashMap<Option<HierarchyUnitId>, Vec<&HierarchyUnit>> = HashMap::new();
    for unit in units {
        let key = unit.parent_id.filter(|p| ids.contains(p));
        children.entry(key).or_default().push(unit);
    }

    fn assemble(
        parent: Option<HierarchyUnitId>,
        children: &HashMap<Option<HierarchyUnitId>, Vec<&HierarchyUnit>>,
        visited: &mut HashSet<HierarchyUnitId>,
    ) -> Vec<HierarchyNode> {
        let mut level: Vec<&HierarchyUnit> = children.get(&parent).cloned().unwrap_or_default();
        level.sort_by(|a, b| {
            a.unit_type
                .cmp(&b.unit_type)
                .then_with(|| a.unit_name.cmp(&b.unit_name))
        });
        level
            .into_iter()
            .filter_map(|u| {
                if !visited.insert(u.id) {
                    return None;
                }
                Some(HierarchyNode {
                    unit: u.clone(),
                    children: assemble(Some(u.id), children, visited),
                })
            })
            .collect()
    }

    let mut visited = HashSet::new();
    assemble(None, &children, &mut visited)
}
