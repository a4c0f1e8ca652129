//! Organisation hierarchy handlers
//!
//! Writes need the hierarchy role. Uniqueness and cycle checks run against
//! the unit list the repository locks for the write.

use axum::{extract::{Path, Query, State}, http::StatusCode, Extension, Json};
use tracing::info;
use validator::Validate;

use core_kernel::{HierarchyUnitId, Page, PageRequest};
use domain_hierarchy::{
    build_tree, check_unique, ensure_no_cycle, is_valid_manager_id, HierarchyError, HierarchyNode,
    HierarchyStats, HierarchyUnit, UnitType,
};
use infra_db::HierarchyFilter;

use crate::{AppState, error::ApiError};
use crate::auth::{permissions, require_role, Claims};
use crate::dto::hierarchy::*;

pub async fn list_units(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<Page<HierarchyUnit>>, ApiError> {
    let filter = HierarchyFilter {
        unit_type: query.unit_type,
        status: query.status,
        parent_id: query.parent_id,
        roots_only: query.roots_only,
    };
    Ok(Json(state.hierarchy.list(&filter, page).await?))
}

pub async fn get_unit(
    State(state): State<AppState>,
    Path(id): Path<HierarchyUnitId>,
) -> Result<Json<HierarchyUnit>, ApiError> {
    Ok(Json(state.hierarchy.get(id).await?))
}

pub async fn by_type(
    State(state): State<AppState>,
    Path(unit_type): Path<UnitType>,
) -> Result<Json<Vec<HierarchyUnit>>, ApiError> {
    let filter = HierarchyFilter {
        unit_type: Some(unit_type),
        ..Default::default()
    };
    Ok(Json(state.hierarchy.all_matching(&filter).await?))
}

/// Direct children of a unit
pub async fn by_parent(
    State(state): State<AppState>,
    Path(id): Path<HierarchyUnitId>,
) -> Result<Json<Vec<HierarchyUnit>>, ApiError> {
    state.hierarchy.get(id).await?;
    let filter = HierarchyFilter {
        parent_id: Some(id),
        ..Default::default()
    };
    Ok(Json(state.hierarchy.all_matching(&filter).await?))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<HierarchyStats>, ApiError> {
    let units = state.hierarchy.all().await?;
    Ok(Json(HierarchyStats::compute(&units)))
}

pub async fn tree(State(state): State<AppState>) -> Result<Json<Vec<HierarchyNode>>, ApiError> {
    let units = state.hierarchy.all().await?;
    Ok(Json(build_tree(&units)))
}

pub async fn create_unit(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Json(request): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<HierarchyUnit>), ApiError> {
    require_role(&user, permissions::HIERARCHY_WRITE)?;
    request.validate()?;

    let mut unit = HierarchyUnit::new(request.unit_name, request.unit_type, request.manager_id)?;
    if let Some(budget) = request.budget {
        unit = unit.with_budget(budget)?;
    }
    unit.description = request.description;
    unit.target_cases = request.target_cases;
    if let Some(status) = request.status {
        unit.status = status;
    }

    let parent_id = request.parent_id;
    let created = state
        .hierarchy
        .create_checked(|units| -> Result<HierarchyUnit, ApiError> {
            if let Some(parent) = parent_id {
                ensure_exists(units, parent)?;
                unit = unit.under(parent);
            }
            check_unique(units, &unit)?;
            Ok(unit)
        })
        .await?;
    info!(unit_id = %created.id, unit_name = %created.unit_name, unit_type = %created.unit_type, "Hierarchy unit created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<HierarchyUnitId>,
    Json(request): Json<UpdateUnitRequest>,
) -> Result<Json<HierarchyUnit>, ApiError> {
    require_role(&user, permissions::HIERARCHY_WRITE)?;
    request.validate()?;

    if let Some(manager_id) = &request.manager_id {
        if !is_valid_manager_id(manager_id) {
            return Err(HierarchyError::InvalidManagerId(manager_id.clone()).into());
        }
    }
    if request.budget.is_some_and(|b| b.is_sign_negative()) {
        return Err(HierarchyError::Validation("budget cannot be negative".into()).into());
    }

    let updated = state
        .hierarchy
        .update_checked(id, |units, mut unit| -> Result<HierarchyUnit, ApiError> {
            if let Some(name) = request.unit_name {
                unit.unit_name = name;
            }
            if let Some(unit_type) = request.unit_type {
                unit.unit_type = unit_type;
            }
            if request.description.is_some() {
                unit.description = request.description;
            }
            if let Some(manager_id) = request.manager_id {
                unit.manager_id = manager_id;
            }
            if let Some(budget) = request.budget {
                unit.budget = Some(budget);
            }
            if let Some(target) = request.target_cases {
                unit.target_cases = target;
            }
            if let Some(status) = request.status {
                unit.status = status;
            }
            if let Some(parent) = request.parent_id {
                if let Some(parent_id) = parent {
                    ensure_exists(units, parent_id)?;
                }
                ensure_no_cycle(units, id, parent)?;
                unit.parent_id = parent;
            }
            unit.validate()?;
            check_unique(units, &unit)?;
            Ok(unit)
        })
        .await?;
    info!(unit_id = %id, "Hierarchy unit updated");
    Ok(Json(updated))
}

/// Deletes a leaf unit; units with children are refused
pub async fn delete_unit(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<HierarchyUnitId>,
) -> Result<StatusCode, ApiError> {
    require_role(&user, permissions::HIERARCHY_WRITE)?;

    let children = state
        .hierarchy
        .all_matching(&HierarchyFilter {
            parent_id: Some(id),
            ..Default::default()
        })
        .await?;
    if !children.is_empty() {
        return Err(ApiError::Conflict(format!(
            "unit has {} child unit(s); move or delete them first",
            children.len()
        )));
    }

    state.hierarchy.delete(id).await?;
    info!(unit_id = %id, "Hierarchy unit deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_exists(units: &[HierarchyUnit], id: HierarchyUnitId) -> Result<(), HierarchyError> {
    if units.iter().any(|u| u.id == id) {
        Ok(())
    } else {
        Err(HierarchyError::UnitNotFound(id.to_string()))
    }
}
