//! Hierarchy domain errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Hierarchy unit not found: {0}")]
    UnitNotFound(String),

    /// Manager IDs look like `mgr-001`
    #[error("Invalid manager id: {0}")]
    InvalidManagerId(String),

    #[error("Manager id already in use: {0}")]
    DuplicateManager(String),

    #[error("A {unit_type} named '{name}' already exists under this parent")]
    DuplicateUnit {
        name: String,
        unit_type: String,
    },

    #[error("Moving {unit} under {parent} would create a cycle")]
    Cycle {
        unit: String,
        parent: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}
