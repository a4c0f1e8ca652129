//! Hierarchy unit repository
//!
//! Uniqueness and cycle rules live in `domain_hierarchy`. Writers go through
//! [`HierarchyRepository::create_checked`] and
//! [`HierarchyRepository::update_checked`], which lock the unit rows and run
//! the caller's checks inside the writing transaction. The table constraints
//! back the same rules up.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{HierarchyUnitId, Page, PageRequest};
use domain_hierarchy::{HierarchyUnit, UnitStatus, UnitType};

use crate::error::{count_column, parse_column, DatabaseError};

const UNIT_COLUMNS: &str = "id, unit_name, unit_type, description, parent_id, manager_id, budget, \
    target_cases, status, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HierarchyUnitRow {
    pub id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub manager_id: String,
    pub budget: Option<Decimal>,
    pub target_cases: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<HierarchyUnitRow> for HierarchyUnit {
    type Error = DatabaseError;

    fn try_from(row: HierarchyUnitRow) -> Result<Self, Self::Error> {
        Ok(HierarchyUnit {
            id: HierarchyUnitId::from_uuid(row.id),
            unit_name: row.unit_name,
            unit_type: parse_column("unit_type", &row.unit_type)?,
            description: row.description,
            parent_id: row.parent_id.map(HierarchyUnitId::from_uuid),
            manager_id: row.manager_id,
            budget: row.budget,
            target_cases: count_column("target_cases", row.target_cases)?,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyFilter {
    pub unit_type: Option<UnitType>,
    pub status: Option<UnitStatus>,
    pub parent_id: Option<HierarchyUnitId>,
    /// Restrict to units without a parent
    pub roots_only: bool,
}

#[derive(Debug, Clone)]
pub struct HierarchyRepository {
    pool: PgPool,
}

impl HierarchyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: HierarchyUnitId) -> Result<HierarchyUnit, DatabaseError> {
        sqlx::query_as::<_, HierarchyUnitRow>(&format!("SELECT {} FROM hierarchy_units WHERE id = $1", UNIT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("HierarchyUnit", id))?
            .try_into()
    }

    /// Every unit, for tree assembly and rule checks
    pub async fn all(&self) -> Result<Vec<HierarchyUnit>, DatabaseError> {
        self.all_matching(&HierarchyFilter::default()).await
    }

    pub async fn all_matching(&self, filter: &HierarchyFilter) -> Result<Vec<HierarchyUnit>, DatabaseError> {
        let rows = sqlx::query_as::<_, HierarchyUnitRow>(&format!(
            "SELECT {} FROM hierarchy_units {} ORDER BY unit_type, unit_name",
            UNIT_COLUMNS, WHERE_CLAUSE
        ))
        .bind(filter.unit_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.parent_id.map(|id| *id.as_uuid()))
        .bind(filter.roots_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(HierarchyUnit::try_from).collect()
    }

    pub async fn list(
        &self,
        filter: &HierarchyFilter,
        page: PageRequest,
    ) -> Result<Page<HierarchyUnit>, DatabaseError> {
        let page = page.normalized();
        let unit_type = filter.unit_type.map(|t| t.as_str());
        let status = filter.status.map(|s| s.as_str());
        let parent = filter.parent_id.map(|id| *id.as_uuid());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM hierarchy_units {}", WHERE_CLAUSE))
            .bind(unit_type)
            .bind(status)
            .bind(parent)
            .bind(filter.roots_only)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, HierarchyUnitRow>(&format!(
            "SELECT {} FROM hierarchy_units {} ORDER BY unit_type, unit_name LIMIT $5 OFFSET $6",
            UNIT_COLUMNS, WHERE_CLAUSE
        ))
        .bind(unit_type)
        .bind(status)
        .bind(parent)
        .bind(filter.roots_only)
        .bind(page.limit_i64())
        .bind(page.offset_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(HierarchyUnit::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, page))
    }

    #[instrument(skip(self, unit), fields(unit_id = %unit.id, unit_type = %unit.unit_type))]
    pub async fn create(&self, unit: &HierarchyUnit) -> Result<HierarchyUnit, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let created = insert_unit(&mut conn, unit).await?;
        debug!("Hierarchy unit created");
        Ok(created)
    }

    pub async fn update(&self, unit: &HierarchyUnit) -> Result<HierarchyUnit, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_unit(&mut conn, unit).await
    }

    /// Builds a new unit from the locked unit list and inserts it in the same transaction
    pub async fn create_checked<E, F>(&self, prepare: F) -> Result<HierarchyUnit, E>
    where
        F: FnOnce(&[HierarchyUnit]) -> Result<HierarchyUnit, E> + Send,
        E: From<DatabaseError>,
    {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let units = lock_units(&mut tx).await?;
        let unit = prepare(&units)?;
        let created = insert_unit(&mut tx, &unit).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(unit_id = %created.id, "Hierarchy unit created under lock");
        Ok(created)
    }

    /// Applies `change` to the stored unit while every unit row is locked
    ///
    /// `change` receives the locked list and the current unit, so parent
    /// moves checked with `ensure_no_cycle` cannot race another move.
    #[instrument(skip(self, change), fields(unit_id = %id))]
    pub async fn update_checked<E, F>(&self, id: HierarchyUnitId, change: F) -> Result<HierarchyUnit, E>
    where
        F: FnOnce(&[HierarchyUnit], HierarchyUnit) -> Result<HierarchyUnit, E> + Send,
        E: From<DatabaseError>,
    {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        let units = lock_units(&mut tx).await?;
        let current = units
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("HierarchyUnit", id))?;
        let unit = change(&units, current)?;
        let updated = update_unit(&mut tx, &unit).await?;
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(updated)
    }

    /// Fails with a foreign key violation while the unit still has children
    pub async fn delete(&self, id: HierarchyUnitId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM hierarchy_units WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("HierarchyUnit", id));
        }
        Ok(())
    }
}

async fn lock_units(conn: &mut PgConnection) -> Result<Vec<HierarchyUnit>, DatabaseError> {
    let rows = sqlx::query_as::<_, HierarchyUnitRow>(&format!(
        "SELECT {} FROM hierarchy_units ORDER BY id FOR UPDATE",
        UNIT_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(HierarchyUnit::try_from).collect()
}

async fn insert_unit(conn: &mut PgConnection, unit: &HierarchyUnit) -> Result<HierarchyUnit, DatabaseError> {
    sqlx::query_as::<_, HierarchyUnitRow>(&format!(
        "INSERT INTO hierarchy_units ({})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {}",
        UNIT_COLUMNS, UNIT_COLUMNS
    ))
    .bind(unit.id.as_uuid())
    .bind(&unit.unit_name)
    .bind(unit.unit_type.as_str())
    .bind(&unit.description)
    .bind(unit.parent_id.map(|id| *id.as_uuid()))
    .bind(&unit.manager_id)
    .bind(unit.budget)
    .bind(unit.target_cases as i32)
    .bind(unit.status.as_str())
    .bind(unit.created_at)
    .bind(unit.updated_at)
    .fetch_one(&mut *conn)
    .await?
    .try_into()
}

async fn update_unit(conn: &mut PgConnection, unit: &HierarchyUnit) -> Result<HierarchyUnit, DatabaseError> {
    sqlx::query_as::<_, HierarchyUnitRow>(&format!(
        "UPDATE hierarchy_units
         SET unit_name = $2, unit_type = $3, description = $4, parent_id = $5, manager_id = $6,
             budget = $7, target_cases = $8, status = $9, updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        UNIT_COLUMNS
    ))
    .bind(unit.id.as_uuid())
    .bind(&unit.unit_name)
    .bind(unit.unit_type.as_str())
    .bind(&unit.description)
    .bind(unit.parent_id.map(|id| *id.as_uuid()))
    .bind(&unit.manager_id)
    .bind(unit.budget)
    .bind(unit.target_cases as i32)
    .bind(unit.status.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("HierarchyUnit", unit.id))?
    .try_into()
}

const WHERE_CLAUSE: &str = "WHERE ($1::text IS NULL OR unit_type = $1)
      AND ($2::text IS NULL OR status = $2)
      AND ($3::uuid IS NULL OR parent_id = $3)
      AND (NOT $4 OR parent_id IS NULL)";
