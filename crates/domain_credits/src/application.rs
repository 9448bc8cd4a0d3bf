//! Credit application records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CreditApplicationId, CreditId, InvoiceId, Money};

/// One application of a credit against an invoice
///
/// For a given credit, the sum of `amount_applied` across its applications
/// never exceeds the credit's original amount; the ledger enforces this by
/// drawing the credit down in the same unit of work that records the
/// application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditApplication {
    /// Unique identifier
    pub id: CreditApplicationId,
    /// The credit drawn from
    pub credit_id: CreditId,
    /// The invoice the amount went to
    pub invoice_id: InvoiceId,
    /// Amount moved in this application
    pub amount_applied: Money,
    /// When the application was recorded
    pub applied_at: DateTime<Utc>,
}

impl CreditApplication {
    /// Creates a new application record
    pub fn new(credit_id: CreditId, invoice_id: InvoiceId, amount_applied: Money) -> Self {
        Self {
            id: CreditApplicationId::new_v7(),
            credit_id,
            invoice_id,
            amount_applied,
            applied_at: Utc::now(),
        }
    }
}
