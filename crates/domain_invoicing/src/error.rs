//! Invoicing domain errors

use core_kernel::MoneyError;
use thiserror::Error;

/// Errors that can occur in the invoicing domain
#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invoice is not editable: {0}")]
    ImmutableInvoice(String),

    #[error("Reason is required for {0}")]
    MissingReason(String),

    #[error("Line item not found: {0}")]
    LineItemNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Dispute already resolved for line item {0}")]
    DisputeAlreadyResolved(String),

    #[error("Line item {0} is not disputed")]
    NotDisputed(String),

    #[error("Line item {0} is already disputed")]
    AlreadyDisputed(String),

    #[error("Counter can only move forward: current {current}, requested {requested}")]
    CounterMovedBackward { current: i64, requested: i64 },

    #[error(transparent)]
    Money(#[from] MoneyError),
}
