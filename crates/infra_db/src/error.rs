//! Database error types
//!
//! This module defines the error types that can occur during database
//! operations, providing meaningful error messages and proper error chaining.
//! It also classifies errors as transient or permanent, which drives the
//! single-retry policy used by the numbering repository.

use std::future::Future;

use thiserror::Error;
use tracing::warn;

/// Errors that can occur during database operations
///
/// This enum captures all possible database-related errors, including
/// connection issues, query failures, and constraint violations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Optimistic-concurrency check failed: the row changed under us
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Lock wait timed out or the transaction was chosen as a deadlock victim
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// Transaction error
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Arguments
    ///
    /// * `entity` - The type of entity (e.g., "Invoice", "Credit")
    /// * `id` - The identifier that was not found
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Creates a concurrent modification error for a stale aggregate
    pub fn concurrent(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::ConcurrentModification(format!(
            "{} '{}' was modified by another transaction",
            entity, id
        ))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
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

    /// Checks if this error may succeed on retry
    ///
    /// Transient errors are connection-level failures and lock contention.
    /// Constraint violations and not-found errors are permanent: retrying
    /// the same statement would fail the same way.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_)
                | DatabaseError::PoolExhausted
                | DatabaseError::LockContention(_)
        )
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// This function analyzes the SQLx error and maps it to the appropriate
/// DatabaseError variant based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                // PostgreSQL error codes
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => {
                            DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                        }
                        "23514" => {
                            DatabaseError::ConstraintViolation(db_err.message().to_string())
                        }
                        "40001" | "40P01" | "55P03" => {
                            DatabaseError::LockContention(db_err.message().to_string())
                        }
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

/// Runs a database operation, retrying exactly once on a transient error
///
/// Permanent errors are returned immediately. A second failure of any kind
/// is returned to the caller; there is no backoff loop here, callers that
/// need one wrap this themselves.
pub async fn retry_once<T, F, Fut>(op: F) -> Result<T, DatabaseError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            warn!(error = %err, "transient database error, retrying once");
            op().await
        }
        Err(err) => Err(err),
    }
}
