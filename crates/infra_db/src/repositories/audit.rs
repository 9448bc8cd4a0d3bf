//! Audit trail repository
//!
//! The audit trail is append-only: this repository exposes insert and read
//! paths and nothing else. Mutating repositories call
//! [`insert_audit_entries`] inside their own transactions so an aggregate
//! change and its audit records commit or roll back together.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::{ActorId, AuditAction, AuditEntry, AuditEntryId, AuditedEntity};

use crate::error::DatabaseError;

/// Database row for an audit entry
#[derive(Debug, sqlx::FromRow)]
pub struct AuditEntryRow {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: serde_json::Value,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntryRow {
    fn into_domain(self) -> Result<AuditEntry, DatabaseError> {
        let action = AuditAction::parse(&self.action).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown audit action '{}'", self.action))
        })?;
        let entity_type = AuditedEntity::parse(&self.entity_type).ok_or_else(|| {
            DatabaseError::SerializationError(format!(
                "unknown audit entity type '{}'",
                self.entity_type
            ))
        })?;
        Ok(AuditEntry {
            id: AuditEntryId::from_uuid(self.id),
            actor_id: ActorId::from_uuid(self.actor_id),
            action,
            entity_type,
            entity_id: self.entity_id,
            details: self.details,
            reason: self.reason,
            recorded_at: self.recorded_at,
        })
    }
}

/// Inserts audit entries within an existing transaction
///
/// Every mutating repository routes its audit records through here so the
/// records land in the same unit of work as the change they describe.
pub(crate) async fn insert_audit_entries(
    tx: &mut Transaction<'_, Postgres>,
    entries: &[AuditEntry],
) -> Result<(), DatabaseError> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, actor_id, action, entity_type, entity_id,
                details, reason, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.actor_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.reason)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Repository for reading and appending the audit trail
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    /// Creates a new AuditRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends standalone audit entries outside any aggregate transaction
    pub async fn append(&self, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        insert_audit_entries(&mut tx, entries).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Retrieves the audit history for one entity, oldest first
    ///
    /// # Arguments
    ///
    /// * `entity_type` - The kind of entity
    /// * `entity_id` - The entity's display-form identifier
    pub async fn list_for_entity(
        &self,
        entity_type: AuditedEntity,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, DatabaseError> {
        let rows: Vec<AuditEntryRow> = sqlx::query_as(
            r#"
            SELECT id, actor_id, action, entity_type, entity_id,
                   details, reason, recorded_at
            FROM audit_entries
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY recorded_at, id
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEntryRow::into_domain).collect()
    }

    /// Retrieves recent actions by one actor, newest first
    pub async fn list_for_actor(
        &self,
        actor_id: ActorId,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, DatabaseError> {
        let rows: Vec<AuditEntryRow> = sqlx::query_as(
            r#"
            SELECT id, actor_id, action, entity_type, entity_id,
                   details, reason, recorded_at
            FROM audit_entries
            WHERE actor_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(*actor_id.as_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEntryRow::into_domain).collect()
    }
}
