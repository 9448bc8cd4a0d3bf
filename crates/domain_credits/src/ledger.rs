//! Credit ledger
//!
//! Coordinates credits, their applications against invoices, and the audit
//! entries every mutation carries. An application is all-or-nothing: the
//! credit decrement, the application record, and the invoice balance update
//! happen together or not at all, so validation runs in full before any
//! state changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

use core_kernel::{
    ActorId, AuditAction, AuditEntry, AuditTrail, AuditedEntity, ClientId, CreditApplicationId,
    CreditId, Currency, Money, MoneyError, PaymentId,
};
use domain_invoicing::Invoice;

use crate::application::CreditApplication;
use crate::credit::{CreditStatus, PaymentCredit};
use crate::error::CreditError;

/// Per-client credit totals, folded by status
///
/// The per-status amounts always sum to `total_amount` exactly; each credit
/// contributes to its current status bucket and to the total once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCreditSummary {
    pub client_id: ClientId,
    pub credit_count: usize,
    pub total_amount: Money,
    pub available_amount: Money,
    pub applied_amount: Money,
    pub expired_amount: Money,
    pub refunded_amount: Money,
    /// Undrawn remainder across available credits
    pub available_remaining: Money,
}

impl ClientCreditSummary {
    /// Sum of the per-status buckets; equals `total_amount` by construction
    pub fn status_sum(&self) -> Money {
        self.available_amount + self.applied_amount + self.expired_amount + self.refunded_amount
    }
}

/// The credit ledger service
#[derive(Debug, Default)]
pub struct CreditLedger {
    credits: HashMap<CreditId, PaymentCredit>,
    applications: Vec<CreditApplication>,
}

impl CreditLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a credit from an overpayment and audits the creation
    pub fn create_from_overpayment(
        &mut self,
        payment_id: Option<PaymentId>,
        client_id: ClientId,
        amount: Money,
        notes: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<CreditId, CreditError> {
        let credit =
            PaymentCredit::from_overpayment(payment_id, client_id, amount, notes, expires_at)?;
        let credit_id = credit.id;

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::CreditCreated,
                AuditedEntity::Credit,
                credit_id.to_string(),
            )
            .with_details(json!({
                "client_id": client_id.to_string(),
                "payment_id": payment_id.map(|p| p.to_string()),
                "amount": amount.amount(),
            })),
        );
        info!(credit_id = %credit_id, %amount, "credit created from overpayment");
        self.credits.insert(credit_id, credit);
        Ok(credit_id)
    }

    /// Registers an existing credit (e.g. loaded from storage)
    pub fn register(&mut self, credit: PaymentCredit) {
        self.credits.insert(credit.id, credit);
    }

    /// Looks up a credit
    pub fn credit(&self, credit_id: CreditId) -> Option<&PaymentCredit> {
        self.credits.get(&credit_id)
    }

    /// All recorded applications, in order
    pub fn applications(&self) -> &[CreditApplication] {
        &self.applications
    }

    /// Applications drawn from one credit
    pub fn applications_for(&self, credit_id: CreditId) -> Vec<&CreditApplication> {
        self.applications
            .iter()
            .filter(|a| a.credit_id == credit_id)
            .collect()
    }

    /// Applies a credit to an invoice
    ///
    /// When `amount` is omitted, applies the lesser of the remaining credit
    /// and the invoice balance. Fails with `InsufficientCredit` when the
    /// amount exceeds the remainder and `OverApplication` when it exceeds
    /// the invoice balance; on failure nothing is mutated.
    pub fn apply_to_invoice(
        &mut self,
        credit_id: CreditId,
        invoice: &mut Invoice,
        amount: Option<Money>,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<CreditApplicationId, CreditError> {
        let credit = self
            .credits
            .get_mut(&credit_id)
            .ok_or_else(|| CreditError::CreditNotFound(credit_id.to_string()))?;

        if credit.status != CreditStatus::Available {
            return Err(CreditError::InvalidCreditState {
                status: credit.status.to_string(),
                operation: "apply_to_invoice".to_string(),
            });
        }

        if credit.remaining_amount.currency() != invoice.currency {
            return Err(CreditError::Money(MoneyError::CurrencyMismatch(
                credit.remaining_amount.currency().to_string(),
                invoice.currency.to_string(),
            )));
        }

        let balance = invoice.balance();
        let requested = match amount {
            Some(a) => a,
            None => credit.remaining_amount.min_of(&balance)?,
        };

        if requested.currency() != credit.remaining_amount.currency() {
            return Err(CreditError::Money(MoneyError::CurrencyMismatch(
                requested.currency().to_string(),
                credit.remaining_amount.currency().to_string(),
            )));
        }
        if !requested.is_positive() {
            return Err(CreditError::InvalidAmount(format!(
                "nothing to apply: requested {requested}"
            )));
        }
        if requested > credit.remaining_amount {
            return Err(CreditError::InsufficientCredit {
                requested: requested.to_string(),
                remaining: credit.remaining_amount.to_string(),
            });
        }
        if requested > balance {
            return Err(CreditError::OverApplication {
                requested: requested.to_string(),
                balance: balance.to_string(),
            });
        }

        // All validation passed; the three mutations below commit together.
        // The credit draw comes before the invoice mutation: a rejected draw
        // must leave the invoice untouched.
        credit.draw(requested)?;
        invoice.record_credit_application(requested)?;
        let application = CreditApplication::new(credit_id, invoice.id, requested);
        let application_id = application.id;

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::CreditApplied,
                AuditedEntity::Credit,
                credit_id.to_string(),
            )
            .with_details(json!({
                "invoice_id": invoice.id.to_string(),
                "application_id": application_id.to_string(),
                "amount_applied": requested.amount(),
                "credit_remaining": credit.remaining_amount.amount(),
            })),
        );
        debug!(
            credit_id = %credit_id,
            invoice_id = %invoice.id,
            amount = %requested,
            "credit applied"
        );
        self.applications.push(application);
        Ok(application_id)
    }

    /// Expires every available credit past its expiry date
    ///
    /// Idempotent: already-expired credits are untouched, and the returned
    /// count covers only credits changed in this call.
    pub fn expire_old_credits(
        &mut self,
        now: DateTime<Utc>,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> usize {
        let mut changed = 0;
        for credit in self.credits.values_mut() {
            if credit.expire(now) {
                trail.append(
                    AuditEntry::new(
                        actor,
                        AuditAction::CreditExpired,
                        AuditedEntity::Credit,
                        credit.id.to_string(),
                    )
                    .with_details(json!({
                        "expired_at": now,
                        "unused_amount": credit.remaining_amount.amount(),
                    })),
                );
                changed += 1;
            }
        }
        if changed > 0 {
            info!(count = changed, "expired unused credits");
        }
        changed
    }

    /// Cancels an available credit, marking it refunded; always audited
    pub fn cancel_credit(
        &mut self,
        credit_id: CreditId,
        reason: &str,
        actor: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), CreditError> {
        if reason.trim().is_empty() {
            return Err(CreditError::MissingReason("cancel_credit".into()));
        }
        let credit = self
            .credits
            .get_mut(&credit_id)
            .ok_or_else(|| CreditError::CreditNotFound(credit_id.to_string()))?;
        credit.cancel()?;

        trail.append(
            AuditEntry::new(
                actor,
                AuditAction::CreditCancelled,
                AuditedEntity::Credit,
                credit_id.to_string(),
            )
            .with_details(json!({
                "refunded_amount": credit.remaining_amount.amount(),
            }))
            .with_reason(reason),
        );
        Ok(())
    }

    /// Folds all of a client's credits into per-status totals
    ///
    /// Only credits denominated in `currency` are counted; a client holding
    /// credits in another currency gets a separate summary per currency.
    pub fn client_credit_summary(
        &self,
        client_id: ClientId,
        currency: Currency,
    ) -> ClientCreditSummary {
        let zero = Money::zero(currency);
        let mut summary = ClientCreditSummary {
            client_id,
            credit_count: 0,
            total_amount: zero,
            available_amount: zero,
            applied_amount: zero,
            expired_amount: zero,
            refunded_amount: zero,
            available_remaining: zero,
        };

        for credit in self.credits.values() {
            if credit.client_id != client_id || credit.amount.currency() != currency {
                continue;
            }
            summary.credit_count += 1;
            summary.total_amount = summary.total_amount + credit.amount;
            match credit.status {
                CreditStatus::Available => {
                    summary.available_amount = summary.available_amount + credit.amount;
                    summary.available_remaining =
                        summary.available_remaining + credit.remaining_amount;
                }
                CreditStatus::Applied => {
                    summary.applied_amount = summary.applied_amount + credit.amount;
                }
                CreditStatus::Expired => {
                    summary.expired_amount = summary.expired_amount + credit.amount;
                }
                CreditStatus::Refunded => {
                    summary.refunded_amount = summary.refunded_amount + credit.amount;
                }
            }
        }
        summary
    }
}
