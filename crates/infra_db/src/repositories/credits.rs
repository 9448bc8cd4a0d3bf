//! Payment credit repository
//!
//! Persists credits, credit applications, and the invoice-side effects of an
//! application in one transaction. The credit row carries an optimistic
//! check on `remaining_amount` so two concurrent applications of the same
//! credit cannot both draw from it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{
    ActorId, AuditAction, AuditEntry, AuditedEntity, ClientId, CreditApplicationId, CreditId,
    Currency, InvoiceId, Money, PaymentId,
};
use domain_credits::{CreditApplication, CreditStatus, PaymentCredit};
use domain_invoicing::{Invoice, InvoiceStatus};

use crate::error::DatabaseError;
use crate::repositories::audit::insert_audit_entries;
use crate::repositories::classify;

/// Database row for a payment credit
#[derive(Debug, sqlx::FromRow)]
struct CreditRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    client_id: Uuid,
    amount: Decimal,
    remaining_amount: Decimal,
    currency: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CreditRow {
    fn into_domain(self) -> Result<PaymentCredit, DatabaseError> {
        let currency = Currency::from_code(&self.currency).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown currency '{}'", self.currency))
        })?;
        let status = CreditStatus::parse(&self.status).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown credit status '{}'", self.status))
        })?;
        Ok(PaymentCredit {
            id: CreditId::from_uuid(self.id),
            payment_id: self.payment_id.map(PaymentId::from_uuid),
            client_id: ClientId::from_uuid(self.client_id),
            amount: Money::new(self.amount, currency),
            remaining_amount: Money::new(self.remaining_amount, currency),
            status,
            expires_at: self.expires_at,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_CREDIT: &str = r#"
    SELECT id, payment_id, client_id, amount, remaining_amount, currency,
           status, expires_at, notes, created_at, updated_at
    FROM payment_credits
"#;

/// Repository for payment credits and their applications
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    /// Creates a new CreditRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a newly created credit with its audit entries
    pub async fn insert(
        &self,
        credit: &PaymentCredit,
        entries: &[AuditEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO payment_credits (
                id, payment_id, client_id, amount, remaining_amount, currency,
                status, expires_at, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*credit.id.as_uuid())
        .bind(credit.payment_id.map(|p| *p.as_uuid()))
        .bind(*credit.client_id.as_uuid())
        .bind(credit.amount.amount())
        .bind(credit.remaining_amount.amount())
        .bind(credit.amount.currency().code())
        .bind(credit.status.as_str())
        .bind(credit.expires_at)
        .bind(&credit.notes)
        .bind(credit.created_at)
        .bind(credit.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        insert_audit_entries(&mut tx, entries).await?;
        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Loads one credit
    pub async fn get(&self, id: CreditId) -> Result<PaymentCredit, DatabaseError> {
        let row: Option<CreditRow> =
            sqlx::query_as(&format!("{SELECT_CREDIT} WHERE id = $1"))
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(classify)?;
        row.ok_or_else(|| DatabaseError::not_found("Credit", id))?
            .into_domain()
    }

    /// Loads a client's credits that are still available to draw from
    pub async fn list_available(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<PaymentCredit>, DatabaseError> {
        let rows: Vec<CreditRow> = sqlx::query_as(&format!(
            "{SELECT_CREDIT} WHERE client_id = $1 AND status = 'available' ORDER BY created_at"
        ))
        .bind(*client_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.into_iter().map(CreditRow::into_domain).collect()
    }

    /// Loads all credits for a client, any status
    pub async fn list_for_client(
        &self,
        client_id: ClientId,
    ) -> Result<Vec<PaymentCredit>, DatabaseError> {
        let rows: Vec<CreditRow> = sqlx::query_as(&format!(
            "{SELECT_CREDIT} WHERE client_id = $1 ORDER BY created_at"
        ))
        .bind(*client_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        rows.into_iter().map(CreditRow::into_domain).collect()
    }

    /// Persists one credit application atomically
    ///
    /// Writes the drawn-down credit, the application record, the invoice's
    /// updated ledger fields, and the audit entries in a single transaction.
    /// The credit update is guarded by the remaining amount the domain layer
    /// drew from; the invoice update by its prior status.
    ///
    /// # Arguments
    ///
    /// * `credit` - The credit after the draw
    /// * `previous_remaining` - The remaining amount the draw started from
    /// * `application` - The application record produced by the ledger
    /// * `invoice` - The invoice after the application
    /// * `expected_invoice_status` - The invoice status before the application
    /// * `entries` - Audit entries produced by the mutation
    pub async fn record_application(
        &self,
        credit: &PaymentCredit,
        previous_remaining: Money,
        application: &CreditApplication,
        invoice: &Invoice,
        expected_invoice_status: InvoiceStatus,
        entries: &[AuditEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let result = sqlx::query(
            r#"
            UPDATE payment_credits
            SET remaining_amount = $3, status = $4, updated_at = $5
            WHERE id = $1 AND remaining_amount = $2 AND status = 'available'
            "#,
        )
        .bind(*credit.id.as_uuid())
        .bind(previous_remaining.amount())
        .bind(credit.remaining_amount.amount())
        .bind(credit.status.as_str())
        .bind(credit.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::concurrent("Credit", credit.id));
        }

        sqlx::query(
            r#"
            INSERT INTO credit_applications (
                id, credit_id, invoice_id, amount_applied, applied_at
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*application.id.as_uuid())
        .bind(*application.credit_id.as_uuid())
        .bind(*application.invoice_id.as_uuid())
        .bind(application.amount_applied.amount())
        .bind(application.applied_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET applied_credits = $3, status = $4, paid_at = $5, updated_at = $6
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(expected_invoice_status.as_str())
        .bind(invoice.applied_credits.amount())
        .bind(invoice.status.as_str())
        .bind(invoice.paid_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::concurrent("Invoice", invoice.id));
        }

        insert_audit_entries(&mut tx, entries).await?;
        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Expires all available credits whose expiry has passed
    ///
    /// Returns the number of credits expired by this call. Already-expired
    /// credits are not matched, so the sweep is idempotent: a second run
    /// over the same data returns zero.
    pub async fn expire_credits(
        &self,
        now: DateTime<Utc>,
        actor: ActorId,
    ) -> Result<usize, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let expired: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE payment_credits
            SET status = 'expired', updated_at = $1
            WHERE status = 'available' AND expires_at IS NOT NULL AND expires_at <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(classify)?;

        let entries: Vec<AuditEntry> = expired
            .iter()
            .map(|(id,)| {
                AuditEntry::new(
                    actor,
                    AuditAction::CreditExpired,
                    AuditedEntity::Credit,
                    CreditId::from_uuid(*id).to_string(),
                )
            })
            .collect();
        insert_audit_entries(&mut tx, &entries).await?;

        tx.commit().await.map_err(classify)?;
        Ok(expired.len())
    }

    /// Cancels an available credit, audited
    pub async fn cancel(
        &self,
        credit_id: CreditId,
        reason: &str,
        actor: ActorId,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let result = sqlx::query(
            r#"
            UPDATE payment_credits
            SET status = 'refunded', updated_at = $2
            WHERE id = $1 AND status = 'available'
            "#,
        )
        .bind(*credit_id.as_uuid())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::concurrent("Credit", credit_id));
        }

        let entry = AuditEntry::new(
            actor,
            AuditAction::CreditCancelled,
            AuditedEntity::Credit,
            credit_id.to_string(),
        )
        .with_reason(reason);
        insert_audit_entries(&mut tx, std::slice::from_ref(&entry)).await?;

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Loads the applications recorded against one invoice
    pub async fn applications_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<CreditApplication>, DatabaseError> {
        let rows: Vec<(Uuid, Uuid, Uuid, Decimal, DateTime<Utc>, String)> = sqlx::query_as(
            r#"
            SELECT a.id, a.credit_id, a.invoice_id, a.amount_applied,
                   a.applied_at, c.currency
            FROM credit_applications a
            JOIN payment_credits c ON c.id = a.credit_id
            WHERE a.invoice_id = $1
            ORDER BY a.applied_at
            "#,
        )
        .bind(*invoice_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.into_iter()
            .map(|(id, credit_id, invoice_id, amount, applied_at, currency)| {
                let currency = Currency::from_code(&currency).ok_or_else(|| {
                    DatabaseError::SerializationError(format!("unknown currency '{currency}'"))
                })?;
                Ok(CreditApplication {
                    id: CreditApplicationId::from_uuid(id),
                    credit_id: CreditId::from_uuid(credit_id),
                    invoice_id: InvoiceId::from_uuid(invoice_id),
                    amount_applied: Money::new(amount, currency),
                    applied_at,
                })
            })
            .collect()
    }
}
