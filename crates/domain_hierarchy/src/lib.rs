//! Organisation Hierarchy Domain
//!
//! Renewal work is distributed across an organisation tree of departments,
//! regions, states, branches and teams. Each unit references its parent
//! directly, so the tree can be re-shaped at runtime; reparenting is checked
//! so a unit never becomes its own ancestor.

pub mod unit;
pub mod tree;
pub mod stats;
pub mod error;

pub use unit::{HierarchyUnit, UnitType, UnitStatus, is_valid_manager_id};
pub use tree::{build_tree, ensure_no_cycle, check_unique, HierarchyNode};
pub use stats::HierarchyStats;
pub use error::HierarchyError;
