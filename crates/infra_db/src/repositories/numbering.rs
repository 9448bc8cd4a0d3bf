//! Invoice numbering repository
//!
//! Issues sequential invoice numbers from a per-organization per-year
//! counter. The increment is a single upsert statement, so two concurrent
//! issuances can never read the same value. When the counter cannot be
//! reached even after one retry, a tagged fallback number is issued instead
//! of failing the invoice.

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{ActorId, AuditAction, AuditEntry, AuditedEntity};
use domain_invoicing::{validate_reset, CounterScope, CounterStatus, IssuedNumber};

use crate::error::{retry_once, DatabaseError};
use crate::repositories::audit::insert_audit_entries;
use crate::repositories::classify;

/// Repository for the durable invoice counters
#[derive(Debug, Clone)]
pub struct NumberingRepository {
    pool: PgPool,
}

impl NumberingRepository {
    /// Creates a new NumberingRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Issues the next invoice number for a scope
    ///
    /// The counter row is created on first use. If the database is
    /// unreachable after one retry, a fallback number is issued and the
    /// failure is logged; issuance itself never fails.
    pub async fn issue(&self, scope: CounterScope) -> IssuedNumber {
        let result = retry_once(|| self.increment(scope)).await;
        match result {
            Ok(value) => IssuedNumber::sequential(scope, value),
            Err(err) => {
                tracing::error!(
                    scope = %scope,
                    error = %err,
                    "counter unreachable, issuing fallback invoice number"
                );
                IssuedNumber::fallback(scope)
            }
        }
    }

    async fn increment(&self, scope: CounterScope) -> Result<i64, DatabaseError> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO invoice_counters (scope_key, year, last_value, updated_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (scope_key, year)
            DO UPDATE SET last_value = invoice_counters.last_value + 1,
                          updated_at = $3
            RETURNING last_value
            "#,
        )
        .bind(scope.key())
        .bind(scope.year)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(value)
    }

    /// Reads the counter state without consuming a value
    ///
    /// Returns `None` when no number has been issued in this scope yet.
    pub async fn status(&self, scope: CounterScope) -> Result<Option<CounterStatus>, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT last_value FROM invoice_counters WHERE scope_key = $1 AND year = $2",
        )
        .bind(scope.key())
        .bind(scope.year)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        Ok(row.map(|(last_value,)| CounterStatus {
            scope_key: scope.key(),
            year: scope.year,
            last_value,
        }))
    }

    /// Administratively moves a counter forward, audited
    ///
    /// The counter can only move forward; a reset below or at the current
    /// value is rejected so no issued number can ever be issued twice. The
    /// current value is read under a row lock so a concurrent issuance
    /// cannot slip between the check and the write.
    pub async fn reset(
        &self,
        scope: CounterScope,
        new_value: i64,
        actor: ActorId,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let current: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT last_value FROM invoice_counters
            WHERE scope_key = $1 AND year = $2
            FOR UPDATE
            "#,
        )
        .bind(scope.key())
        .bind(scope.year)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?;

        let current_last = current.map(|(v,)| v).unwrap_or(0);
        validate_reset(current_last, new_value)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO invoice_counters (scope_key, year, last_value, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (scope_key, year)
            DO UPDATE SET last_value = $3, updated_at = $4
            "#,
        )
        .bind(scope.key())
        .bind(scope.year)
        .bind(new_value)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let entry = AuditEntry::new(
            actor,
            AuditAction::CounterReset,
            AuditedEntity::InvoiceCounter,
            scope.key(),
        )
        .with_details(serde_json::json!({
            "previous_last_value": current_last,
            "new_last_value": new_value,
        }));
        insert_audit_entries(&mut tx, std::slice::from_ref(&entry)).await?;

        tx.commit().await.map_err(classify)?;
        Ok(())
    }
}
