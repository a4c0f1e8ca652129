//! Database error types
//!
//! Errors raised by sqlx are mapped onto [`DatabaseError`] by PostgreSQL
//! error code, and [`DatabaseError`] maps onto the kernel's [`PortError`]
//! for adapters that sit behind a domain port.

use std::str::FromStr;

use thiserror::Error;

use core_kernel::{CoreError, PortError};

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored value could not be turned back into a domain value
    #[error("Invalid value in column {column}: {message}")]
    Decode { column: &'static str, message: String },

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Maps sqlx errors by PostgreSQL error code
///
/// See <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "Record",
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateEntry(message) => PortError::conflict(message),
            DatabaseError::ForeignKeyViolation(message) | DatabaseError::ConstraintViolation(message) => {
                PortError::validation(message)
            }
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::ServiceUnavailable {
                service: "database".to_string(),
            },
            other => PortError::internal(other.to_string()),
        }
    }
}

/// Parses a TEXT column into one of the domain's string enums
pub(crate) fn parse_column<T>(column: &'static str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr<Err = CoreError>,
{
    value.parse().map_err(|e: CoreError| DatabaseError::Decode {
        column,
        message: e.to_string(),
    })
}

/// Converts a non-negative INTEGER column into a count
pub(crate) fn count_column(column: &'static str, value: i32) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::Decode {
        column,
        message: format!("negative value {}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_customer::CustomerStatus;

    #[test]
    fn test_not_found_maps_to_port_not_found() {
        let port: PortError = DatabaseError::not_found("Customer", "CUS-1").into();
        assert!(port.is_not_found());
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let port: PortError = DatabaseError::DuplicateEntry("code".into()).into();
        assert!(matches!(port, PortError::Conflict { .. }));
    }

    #[test]
    fn test_parse_column() {
        let status: CustomerStatus = parse_column("status", "lapsed").unwrap();
        assert_eq!(status, CustomerStatus::Lapsed);

        let err = parse_column::<CustomerStatus>("status", "gone").unwrap_err();
        assert!(matches!(err, DatabaseError::Decode { column: "status", .. }));
    }

    #[test]
    fn test_count_column_rejects_negative() {
        assert_eq!(count_column("total_policies", 3).unwrap(), 3);
        assert!(count_column("total_policies", -1).is_err());
    }
}
