//! Invoice aggregate
//!
//! The invoice owns its line items, its payment ledger fields, and its
//! lifecycle state. All status changes go through [`Invoice::transition`],
//! which validates against the single transition table in
//! [`crate::status::InvoiceStatus`]. Once an invoice leaves `draft`, line
//! items are locked; every escape from that lock carries a reason and is
//! audited.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use core_kernel::{
    ActorId, AuditAction, AuditEntry, AuditTrail, AuditedEntity, ClientId, Currency, InvoiceId,
    LineItemId, Money, OrganizationId, PaymentId,
};

use crate::calculator::{compute_balance, compute_total, AgingEntry};
use crate::error::InvoicingError;
use crate::status::InvoiceStatus;

/// A single billable charge on an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Unique identifier
    pub id: LineItemId,
    /// Sample/order identifier
    pub accession_number: String,
    /// Billable procedure code
    pub cpt_code: String,
    /// Quantity billed
    pub quantity: Decimal,
    /// Price per unit
    pub unit_price: Money,
    /// Explicit total override; `None` means `quantity x unit_price`
    pub total: Option<Money>,
    /// Reason recorded when the total was overridden
    pub total_override_reason: Option<String>,
    /// True when the item entered billing through duplicate-review approval
    pub is_override: bool,
    /// Dispute state
    pub is_disputed: bool,
    pub dispute_reason: Option<String>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
}

impl InvoiceLineItem {
    /// Creates a new line item with total derived from quantity and price
    pub fn new(
        accession_number: impl Into<String>,
        cpt_code: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
    ) -> Self {
        Self {
            id: LineItemId::new_v7(),
            accession_number: accession_number.into(),
            cpt_code: cpt_code.into(),
            quantity,
            unit_price,
            total: None,
            total_override_reason: None,
            is_override: false,
            is_disputed: false,
            dispute_reason: None,
            dispute_resolved_at: None,
        }
    }

    /// Overrides the derived total, with a mandatory reason
    pub fn with_total_override(
        mut self,
        total: Money,
        reason: impl Into<String>,
    ) -> Result<Self, InvoicingError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("line item total override".into()));
        }
        self.total = Some(total);
        self.total_override_reason = Some(reason);
        Ok(self)
    }

    /// Marks the item as entered through duplicate-review approval
    pub fn flagged_as_override(mut self) -> Self {
        self.is_override = true;
        self
    }

    /// The authoritative total for this item
    pub fn effective_total(&self) -> Money {
        self.total
            .unwrap_or_else(|| self.unit_price * self.quantity)
    }
}

/// Options for a status transition
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionOptions {
    /// Snapshot subtotal/total into frozen fields on draft -> sent
    pub freeze_prices: bool,
}

/// Outcome of marking a dispute resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    /// The charge stands as billed
    Rejected,
    /// The dispute was upheld; the adjustment is a separate write-off or
    /// credit entry, never an automatic recalculation
    Accepted,
}

/// A billing invoice for a client within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Owning organization (tenant)
    pub organization_id: OrganizationId,
    /// Client being billed
    pub client_id: ClientId,
    /// Human-readable number, unique within organization and year
    pub invoice_number: String,
    /// Currency for every amount on this invoice
    pub currency: Currency,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Line items
    pub items: Vec<InvoiceLineItem>,
    /// Payment due date
    pub due_date: Option<NaiveDate>,
    /// Subtotal snapshotted on send; `None` while prices float
    pub frozen_subtotal: Option<Money>,
    /// Total snapshotted on send
    pub frozen_total: Option<Money>,
    /// Sum of recorded payments
    pub amount_paid: Money,
    /// Sum of credit applications
    pub applied_credits: Money,
    /// Manually written-off amount
    pub write_off_amount: Money,
    pub write_off_reason: Option<String>,
    /// Set-once lifecycle timestamps
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Record timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new draft invoice
    pub fn new(
        organization_id: OrganizationId,
        client_id: ClientId,
        invoice_number: impl Into<String>,
        currency: Currency,
        due_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InvoiceId::new_v7(),
            organization_id,
            client_id,
            invoice_number: invoice_number.into(),
            currency,
            status: InvoiceStatus::Draft,
            items: Vec::new(),
            due_date,
            frozen_subtotal: None,
            frozen_total: None,
            amount_paid: Money::zero(currency),
            applied_credits: Money::zero(currency),
            write_off_amount: Money::zero(currency),
            write_off_reason: None,
            sent_at: None,
            viewed_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current subtotal: the frozen snapshot once sent, else derived
    pub fn subtotal(&self) -> Money {
        self.frozen_subtotal
            .unwrap_or_else(|| compute_total(&self.items, self.currency))
    }

    /// Current total: the frozen snapshot once sent, else derived
    pub fn total(&self) -> Money {
        self.frozen_total.unwrap_or_else(|| self.subtotal())
    }

    /// Outstanding balance; negative signals an overpayment
    pub fn balance(&self) -> Money {
        compute_balance(
            self.total(),
            self.amount_paid,
            self.applied_credits,
            self.write_off_amount,
        )
    }

    /// True while prices are frozen (invoice has been sent)
    pub fn is_frozen(&self) -> bool {
        self.frozen_total.is_some()
    }

    /// Returns this invoice as an aging position
    pub fn aging_entry(&self) -> AgingEntry {
        AgingEntry {
            invoice_id: self.id,
            due_date: self.due_date,
            outstanding: self.balance(),
        }
    }

    fn ensure_editable(&self, operation: &str) -> Result<(), InvoicingError> {
        if self.status != InvoiceStatus::Draft {
            return Err(InvoicingError::ImmutableInvoice(format!(
                "{operation} requires draft status, invoice {} is {}",
                self.invoice_number, self.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Adds a line item; only allowed while the invoice is a draft
    pub fn add_item(&mut self, item: InvoiceLineItem) -> Result<LineItemId, InvoicingError> {
        self.ensure_editable("add_item")?;
        let id = item.id;
        self.items.push(item);
        self.touch();
        Ok(id)
    }

    /// Adds a line item to a non-draft invoice
    ///
    /// The escape from the edit lock is never silent: a reason is required
    /// and one audit entry is written.
    pub fn add_item_with_override(
        &mut self,
        item: InvoiceLineItem,
        actor: ActorId,
        reason: &str,
        trail: &mut AuditTrail,
    ) -> Result<LineItemId, InvoicingError> {
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("locked invoice edit".into()));
        }
        let id = item.id;
        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::FieldOverridden,
                AuditedEntity::Invoice,
                self.id.to_string(),
            )
            .with_details(json!({
                "operation": "add_item",
                "line_item_id": id.to_string(),
                "accession_number": item.accession_number,
                "cpt_code": item.cpt_code,
                "status": self.status.as_str(),
            }))
            .with_reason(reason),
        );
        self.items.push(item);
        self.touch();
        Ok(id)
    }

    /// Removes a line item; only allowed while the invoice is a draft
    pub fn remove_item(&mut self, item_id: LineItemId) -> Result<InvoiceLineItem, InvoicingError> {
        self.ensure_editable("remove_item")?;
        let idx = self.item_index(item_id)?;
        let item = self.items.remove(idx);
        self.touch();
        Ok(item)
    }

    /// Updates a line item's unit price; only allowed while a draft
    pub fn update_item_price(
        &mut self,
        item_id: LineItemId,
        unit_price: Money,
    ) -> Result<(), InvoicingError> {
        self.ensure_editable("update_item_price")?;
        let idx = self.item_index(item_id)?;
        self.items[idx].unit_price = unit_price;
        self.touch();
        Ok(())
    }

    /// Updates a line item's unit price on a locked invoice, audited
    pub fn update_item_price_with_override(
        &mut self,
        item_id: LineItemId,
        unit_price: Money,
        actor: ActorId,
        reason: &str,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("locked invoice edit".into()));
        }
        let idx = self.item_index(item_id)?;
        let previous = self.items[idx].unit_price;
        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::FieldOverridden,
                AuditedEntity::LineItem,
                item_id.to_string(),
            )
            .with_details(json!({
                "operation": "update_item_price",
                "invoice_id": self.id.to_string(),
                "previous_unit_price": previous.amount(),
                "new_unit_price": unit_price.amount(),
            }))
            .with_reason(reason),
        );
        self.items[idx].unit_price = unit_price;
        self.touch();
        Ok(())
    }

    /// Applies a validated status transition
    ///
    /// Fails with `InvalidTransition` when the target is not in the allowed
    /// set for the current status. Lifecycle timestamps are set once and
    /// only once. Every successful transition appends one audit entry
    /// recording from- and to-status.
    pub fn transition(
        &mut self,
        target: InvoiceStatus,
        actor: ActorId,
        opts: TransitionOptions,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        let from = self.status;
        if !from.can_transition_to(target) {
            return Err(InvoicingError::InvalidTransition {
                from: from.to_string(),
                to: target.to_string(),
            });
        }

        if from == InvoiceStatus::Draft && target == InvoiceStatus::Sent && opts.freeze_prices {
            let subtotal = compute_total(&self.items, self.currency);
            self.frozen_subtotal = Some(subtotal);
            self.frozen_total = Some(subtotal);
        }

        let now = Utc::now();
        match target {
            InvoiceStatus::Sent => {
                self.sent_at.get_or_insert(now);
            }
            InvoiceStatus::Viewed => {
                self.viewed_at.get_or_insert(now);
            }
            InvoiceStatus::Paid => {
                self.paid_at.get_or_insert(now);
            }
            _ => {}
        }

        self.status = target;
        self.touch();

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::StatusChanged,
                AuditedEntity::Invoice,
                self.id.to_string(),
            )
            .with_details(json!({
                "from": from.as_str(),
                "to": target.as_str(),
            })),
        );
        Ok(())
    }

    /// Returns a sent invoice to draft for correction
    ///
    /// Rejected for paid or cancelled invoices. Clears `sent_at`/`viewed_at`
    /// and the price freeze; the reason is mandatory and always audited.
    pub fn revert_to_draft(
        &mut self,
        actor: ActorId,
        reason: &str,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("revert_to_draft".into()));
        }
        if matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(InvoicingError::InvalidTransition {
                from: self.status.to_string(),
                to: InvoiceStatus::Draft.to_string(),
            });
        }

        let from = self.status;
        self.status = InvoiceStatus::Draft;
        self.sent_at = None;
        self.viewed_at = None;
        self.frozen_subtotal = None;
        self.frozen_total = None;
        self.touch();

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::RevertedToDraft,
                AuditedEntity::Invoice,
                self.id.to_string(),
            )
            .with_details(json!({ "from": from.as_str() }))
            .with_reason(reason),
        );
        Ok(())
    }

    /// Records a payment against the invoice
    ///
    /// Returns the overpaid excess, if any; the caller must route the
    /// excess to credit creation. The invoice itself never carries a
    /// negative balance past this call. Status is advanced to `partial` or
    /// `paid` through the normal transition chokepoint.
    pub fn record_payment(
        &mut self,
        payment_id: PaymentId,
        amount: Money,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<Option<Money>, InvoicingError> {
        if !amount.is_positive() {
            return Err(InvoicingError::InvalidAmount(format!(
                "payment amount must be positive, got {amount}"
            )));
        }
        if matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            return Err(InvoicingError::ImmutableInvoice(format!(
                "cannot record payment while invoice is {}",
                self.status
            )));
        }

        self.amount_paid = self.amount_paid.checked_add(&amount)?;
        let balance = self.balance();
        let excess = if balance.is_negative() {
            let excess = balance.abs();
            // The overpayment becomes a credit; this invoice settles at its
            // exact total.
            self.amount_paid = self.amount_paid.checked_sub(&excess)?;
            Some(excess)
        } else {
            None
        };

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::PaymentRecorded,
                AuditedEntity::Invoice,
                self.id.to_string(),
            )
            .with_details(json!({
                "payment_id": payment_id.to_string(),
                "amount": amount.amount(),
                "overpayment": excess.map(|e| e.amount()),
            })),
        );
        self.touch();

        self.settle_status(actor, trail)?;
        Ok(excess)
    }

    /// Records a credit application amount against this invoice
    ///
    /// Validation of the credit side lives in the credit ledger; this only
    /// guards the invoice-side invariant that the balance never goes
    /// negative through credits.
    pub fn record_credit_application(&mut self, amount: Money) -> Result<(), InvoicingError> {
        if !amount.is_positive() {
            return Err(InvoicingError::InvalidAmount(format!(
                "credit application must be positive, got {amount}"
            )));
        }
        if amount > self.balance() {
            return Err(InvoicingError::InvalidAmount(format!(
                "credit application {amount} exceeds balance {}",
                self.balance()
            )));
        }
        self.applied_credits = self.applied_credits.checked_add(&amount)?;
        self.touch();
        Ok(())
    }

    /// Records a manual write-off against the balance, audited
    pub fn record_write_off(
        &mut self,
        amount: Money,
        reason: &str,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("write_off".into()));
        }
        if !amount.is_positive() {
            return Err(InvoicingError::InvalidAmount(format!(
                "write-off must be positive, got {amount}"
            )));
        }
        if amount > self.balance() {
            return Err(InvoicingError::InvalidAmount(format!(
                "write-off {amount} exceeds balance {}",
                self.balance()
            )));
        }

        self.write_off_amount = self.write_off_amount.checked_add(&amount)?;
        self.write_off_reason = Some(reason.to_string());
        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::WriteOffRecorded,
                AuditedEntity::Invoice,
                self.id.to_string(),
            )
            .with_details(json!({ "amount": amount.amount() }))
            .with_reason(reason),
        );
        self.touch();
        Ok(())
    }

    /// Opens a dispute on a line item, audited
    pub fn dispute_item(
        &mut self,
        item_id: LineItemId,
        reason: &str,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        if reason.trim().is_empty() {
            return Err(InvoicingError::MissingReason("dispute".into()));
        }
        let idx = self.item_index(item_id)?;
        if self.items[idx].is_disputed {
            return Err(InvoicingError::AlreadyDisputed(item_id.to_string()));
        }
        self.items[idx].is_disputed = true;
        self.items[idx].dispute_reason = Some(reason.to_string());
        self.items[idx].dispute_resolved_at = None;

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::DisputeOpened,
                AuditedEntity::LineItem,
                item_id.to_string(),
            )
            .with_details(json!({ "invoice_id": self.id.to_string() }))
            .with_reason(reason),
        );
        self.touch();
        Ok(())
    }

    /// Resolves an open dispute on a line item, audited
    ///
    /// An accepted resolution does not recalculate totals; the monetary
    /// adjustment is a separate write-off or credit entry.
    pub fn resolve_item_dispute(
        &mut self,
        item_id: LineItemId,
        resolution: DisputeResolution,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        let idx = self.item_index(item_id)?;
        if !self.items[idx].is_disputed {
            return Err(InvoicingError::NotDisputed(item_id.to_string()));
        }
        if self.items[idx].dispute_resolved_at.is_some() {
            return Err(InvoicingError::DisputeAlreadyResolved(item_id.to_string()));
        }

        self.items[idx].is_disputed = false;
        self.items[idx].dispute_resolved_at = Some(Utc::now());

        if resolution == DisputeResolution::Accepted {
            warn!(
                invoice_id = %self.id,
                line_item_id = %item_id,
                "dispute accepted; invoice totals unchanged until a write-off or credit is entered"
            );
        }

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::DisputeResolved,
                AuditedEntity::LineItem,
                item_id.to_string(),
            )
            .with_details(json!({
                "invoice_id": self.id.to_string(),
                "resolution": resolution,
            })),
        );
        self.touch();
        Ok(())
    }

    fn item_index(&self, item_id: LineItemId) -> Result<usize, InvoicingError> {
        self.items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| InvoicingError::LineItemNotFound(item_id.to_string()))
    }

    /// Advances status from the payment ledger state, through the
    /// transition chokepoint
    fn settle_status(
        &mut self,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), InvoicingError> {
        let balance = self.balance();
        if balance.is_zero() && self.status.can_transition_to(InvoiceStatus::Paid) {
            self.transition(InvoiceStatus::Paid, actor, TransitionOptions::default(), trail)?;
        } else if balance.is_positive()
            && self.amount_paid.is_positive()
            && self.status.can_transition_to(InvoiceStatus::Partial)
        {
            self.transition(
                InvoiceStatus::Partial,
                actor,
                TransitionOptions::default(),
                trail,
            )?;
        }
        Ok(())
    }
}
