//! Invoice repository
//!
//! Persists the invoice aggregate: the invoice row, its line items, and the
//! audit entries produced by the mutation, all in one transaction. Saves are
//! guarded by an optimistic status check so two concurrent transitions on
//! the same invoice cannot both win.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::{AuditEntry, ClientId, Currency, InvoiceId, LineItemId, Money, OrganizationId};
use domain_invoicing::{Invoice, InvoiceLineItem, InvoiceStatus};

use crate::error::DatabaseError;
use crate::repositories::audit::insert_audit_entries;
use crate::repositories::classify;

/// Database row for an invoice
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    organization_id: Uuid,
    client_id: Uuid,
    invoice_number: String,
    currency: String,
    status: String,
    due_date: Option<NaiveDate>,
    frozen_subtotal: Option<Decimal>,
    frozen_total: Option<Decimal>,
    amount_paid: Decimal,
    applied_credits: Decimal,
    write_off_amount: Decimal,
    write_off_reason: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Database row for a line item
#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    id: Uuid,
    invoice_id: Uuid,
    accession_number: String,
    cpt_code: String,
    quantity: Decimal,
    unit_price: Decimal,
    total: Option<Decimal>,
    total_override_reason: Option<String>,
    is_override: bool,
    is_disputed: bool,
    dispute_reason: Option<String>,
    dispute_resolved_at: Option<DateTime<Utc>>,
}

fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_code(code)
        .ok_or_else(|| DatabaseError::SerializationError(format!("unknown currency '{code}'")))
}

impl InvoiceRow {
    fn into_domain(self, item_rows: Vec<LineItemRow>) -> Result<Invoice, DatabaseError> {
        let currency = parse_currency(&self.currency)?;
        let status = InvoiceStatus::parse(&self.status).ok_or_else(|| {
            DatabaseError::SerializationError(format!("unknown invoice status '{}'", self.status))
        })?;
        let items = item_rows
            .into_iter()
            .map(|row| row.into_domain(currency))
            .collect();
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            client_id: ClientId::from_uuid(self.client_id),
            invoice_number: self.invoice_number,
            currency,
            status,
            items,
            due_date: self.due_date,
            frozen_subtotal: self.frozen_subtotal.map(|a| Money::new(a, currency)),
            frozen_total: self.frozen_total.map(|a| Money::new(a, currency)),
            amount_paid: Money::new(self.amount_paid, currency),
            applied_credits: Money::new(self.applied_credits, currency),
            write_off_amount: Money::new(self.write_off_amount, currency),
            write_off_reason: self.write_off_reason,
            sent_at: self.sent_at,
            viewed_at: self.viewed_at,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl LineItemRow {
    fn into_domain(self, currency: Currency) -> InvoiceLineItem {
        InvoiceLineItem {
            id: LineItemId::from_uuid(self.id),
            accession_number: self.accession_number,
            cpt_code: self.cpt_code,
            quantity: self.quantity,
            unit_price: Money::new(self.unit_price, currency),
            total: self.total.map(|a| Money::new(a, currency)),
            total_override_reason: self.total_override_reason,
            is_override: self.is_override,
            is_disputed: self.is_disputed,
            dispute_reason: self.dispute_reason,
            dispute_resolved_at: self.dispute_resolved_at,
        }
    }
}

/// Repository for invoice aggregates
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new invoice with its line items and audit entries
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` when the invoice number is
    /// already taken within the organization and year.
    pub async fn insert(
        &self,
        invoice: &Invoice,
        entries: &[AuditEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, organization_id, client_id, invoice_number, year, currency,
                status, due_date, frozen_subtotal, frozen_total, amount_paid,
                applied_credits, write_off_amount, write_off_reason,
                sent_at, viewed_at, paid_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                      $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(*invoice.organization_id.as_uuid())
        .bind(*invoice.client_id.as_uuid())
        .bind(&invoice.invoice_number)
        .bind(invoice.created_at.year())
        .bind(invoice.currency.code())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.frozen_subtotal.map(|m| m.amount()))
        .bind(invoice.frozen_total.map(|m| m.amount()))
        .bind(invoice.amount_paid.amount())
        .bind(invoice.applied_credits.amount())
        .bind(invoice.write_off_amount.amount())
        .bind(&invoice.write_off_reason)
        .bind(invoice.sent_at)
        .bind(invoice.viewed_at)
        .bind(invoice.paid_at)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        insert_line_items(&mut tx, invoice).await?;
        insert_audit_entries(&mut tx, entries).await?;

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Loads an invoice with its line items
    pub async fn get(&self, id: InvoiceId) -> Result<Invoice, DatabaseError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, organization_id, client_id, invoice_number, currency,
                   status, due_date, frozen_subtotal, frozen_total, amount_paid,
                   applied_credits, write_off_amount, write_off_reason,
                   sent_at, viewed_at, paid_at, created_at, updated_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        let row = row.ok_or_else(|| DatabaseError::not_found("Invoice", id))?;
        let items = self.fetch_items(&[row.id]).await?;
        row.into_domain(items)
    }

    /// Persists a mutated invoice, guarded by an optimistic status check
    ///
    /// The update only applies while the stored row still has
    /// `expected_status`. Zero affected rows means another transaction moved
    /// the invoice first; the caller reloads and re-validates.
    pub async fn save(
        &self,
        invoice: &Invoice,
        expected_status: InvoiceStatus,
        entries: &[AuditEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                invoice_number = $3,
                status = $4,
                due_date = $5,
                frozen_subtotal = $6,
                frozen_total = $7,
                amount_paid = $8,
                applied_credits = $9,
                write_off_amount = $10,
                write_off_reason = $11,
                sent_at = $12,
                viewed_at = $13,
                paid_at = $14,
                updated_at = $15
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(expected_status.as_str())
        .bind(&invoice.invoice_number)
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.frozen_subtotal.map(|m| m.amount()))
        .bind(invoice.frozen_total.map(|m| m.amount()))
        .bind(invoice.amount_paid.amount())
        .bind(invoice.applied_credits.amount())
        .bind(invoice.write_off_amount.amount())
        .bind(&invoice.write_off_reason)
        .bind(invoice.sent_at)
        .bind(invoice.viewed_at)
        .bind(invoice.paid_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::concurrent("Invoice", invoice.id));
        }

        // Line items are owned by the aggregate; replace wholesale.
        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(*invoice.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        insert_line_items(&mut tx, invoice).await?;
        insert_audit_entries(&mut tx, entries).await?;

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    /// Loads all invoices for an organization that carry an open balance
    ///
    /// Draft and cancelled invoices are excluded; this is the input set for
    /// the aging report.
    pub async fn list_outstanding(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Invoice>, DatabaseError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, organization_id, client_id, invoice_number, currency,
                   status, due_date, frozen_subtotal, frozen_total, amount_paid,
                   applied_credits, write_off_amount, write_off_reason,
                   sent_at, viewed_at, paid_at, created_at, updated_at
            FROM invoices
            WHERE organization_id = $1
              AND status NOT IN ('draft', 'cancelled', 'paid')
            ORDER BY due_date NULLS LAST, created_at
            "#,
        )
        .bind(*organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.fetch_items(&ids).await?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            let own: Vec<LineItemRow> = {
                let (mine, rest) = items.into_iter().partition(|i| i.invoice_id == row.id);
                items = rest;
                mine
            };
            invoices.push(row.into_domain(own)?);
        }
        Ok(invoices)
    }

    async fn fetch_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<LineItemRow>, DatabaseError> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as(
            r#"
            SELECT id, invoice_id, accession_number, cpt_code, quantity,
                   unit_price, total, total_override_reason, is_override,
                   is_disputed, dispute_reason, dispute_resolved_at
            FROM invoice_line_items
            WHERE invoice_id = ANY($1)
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }
}

async fn insert_line_items(
    tx: &mut Transaction<'_, Postgres>,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    for item in &invoice.items {
        sqlx::query(
            r#"
            INSERT INTO invoice_line_items (
                id, invoice_id, accession_number, cpt_code, quantity,
                unit_price, total, total_override_reason, is_override,
                is_disputed, dispute_reason, dispute_resolved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(*item.id.as_uuid())
        .bind(*invoice.id.as_uuid())
        .bind(&item.accession_number)
        .bind(&item.cpt_code)
        .bind(item.quantity)
        .bind(item.unit_price.amount())
        .bind(item.total.map(|m| m.amount()))
        .bind(&item.total_override_reason)
        .bind(item.is_override)
        .bind(item.is_disputed)
        .bind(&item.dispute_reason)
        .bind(item.dispute_resolved_at)
        .execute(&mut **tx)
        .await
        .map_err(classify)?;
    }
    Ok(())
}
