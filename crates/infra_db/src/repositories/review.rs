//! Duplicate review repository
//!
//! Persists flagged duplicate candidates and their review decisions. A
//! decision only lands while the stored row is still pending, so two
//! reviewers racing on the same candidate cannot both decide it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{ActorId, AuditEntry, CandidateId, Currency, Money, OrganizationId};
use domain_review::{CandidateStatus, DuplicateCandidate, DuplicateKey};

use crate::error::DatabaseError;
use crate::repositories::audit::insert_audit_entries;
use crate::repositories::classify;

/// Database row for a duplicate candidate
#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    organization_id: Uuid,
    accession_number: String,
    cpt_code: String,
    service_date: NaiveDate,
    unit_price: Decimal,
    quantity: Decimal,
    currency: String,
    status: String,
    override_reason: Option<String>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CandidateRow {
    fn into_domain(self) -> Result<DuplicateCandidate, DatabaseError> {
        let currency = Currency::from_code(&self.currency).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown currency '{}'", self.currency))
        })?;
        let status = CandidateStatus::parse(&self.status).ok_or_else(|| {
            DatabaseError::SerializationError(format!(
                "unknown candidate status '{}'",
                self.status
            ))
        })?;
        Ok(DuplicateCandidate {
            id: CandidateId::from_uuid(self.id),
            key: DuplicateKey::new(
                OrganizationId::from_uuid(self.organization_id),
                self.accession_number,
                self.cpt_code,
            ),
            service_date: self.service_date,
            unit_price: Money::new(self.unit_price, currency),
            quantity: self.quantity,
            status,
            override_reason: self.override_reason,
            reviewed_by: self.reviewed_by.map(ActorId::from_uuid),
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        })
    }
}

const SELECT_CANDIDATE: &str = r#"
    SELECT id, organization_id, accession_number, cpt_code, service_date,
           unit_price, quantity, currency, status, override_reason,
           reviewed_by, reviewed_at, created_at
    FROM duplicate_candidates
"#;

/// Repository for the duplicate review queue
#[derive(Debug, Clone)]
pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    /// Creates a new ReviewRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a freshly flagged candidate
    pub async fn insert(&self, candidate: &DuplicateCandidate) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO duplicate_candidates (
                id, organization_id, accession_number, cpt_code, service_date,
                unit_price, quantity, currency, status, override_reason,
                reviewed_by, reviewed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(*candidate.id.as_uuid())
        .bind(*candidate.key.organization_id.as_uuid())
        .bind(&candidate.key.accession_number)
        .bind(&candidate.key.cpt_code)
        .bind(candidate.service_date)
        .bind(candidate.unit_price.amount())
        .bind(candidate.quantity)
        .bind(candidate.unit_price.currency().code())
        .bind(candidate.status.as_str())
        .bind(&candidate.override_reason)
        .bind(candidate.reviewed_by.map(|a| *a.as_uuid()))
        .bind(candidate.reviewed_at)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    /// Loads one candidate
    pub async fn get(&self, id: CandidateId) -> Result<DuplicateCandidate, DatabaseError> {
        let row: Option<CandidateRow> =
            sqlx::query_as(&format!("{SELECT_CANDIDATE} WHERE id = $1"))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;
        row.ok_or_else(|| DatabaseError::not_found("DuplicateCandidate", id))?
            .into_domain()
    }

    /// Loads the pending candidates for an organization, oldest first
    pub async fn list_pending(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<DuplicateCandidate>, DatabaseError> {
        let rows: Vec<CandidateRow> = sqlx::query_as(&format!(
            "{SELECT_CANDIDATE} WHERE organization_id = $1 AND status = 'pending' ORDER BY created_at"
        ))
        .bind(*organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.into_iter().map(CandidateRow::into_domain).collect()
    }

    /// Persists a review decision with its audit entries
    ///
    /// Only applies while the stored row is still pending; zero affected
    /// rows means another reviewer decided first.
    pub async fn record_decision(
        &self,
        candidate: &DuplicateCandidate,
        entries: &[AuditEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let result = sqlx::query(
            r#"
            UPDATE duplicate_candidates
            SET status = $2, override_reason = $3, reviewed_by = $4, reviewed_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(*candidate.id.as_uuid())
        .bind(candidate.status.as_str())
        .bind(&candidate.override_reason)
        .bind(candidate.reviewed_by.map(|a| *a.as_uuid()))
        .bind(candidate.reviewed_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::concurrent("DuplicateCandidate", candidate.id));
        }

        insert_audit_entries(&mut tx, entries).await?;
        tx.commit().await.map_err(classify)?;
        Ok(())
    }
}
