//! Credits domain errors

use core_kernel::MoneyError;
use domain_invoicing::InvoicingError;
use thiserror::Error;

/// Errors that can occur in the credits domain
#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Credit not found: {0}")]
    CreditNotFound(String),

    #[error("Insufficient credit: requested {requested}, remaining {remaining}")]
    InsufficientCredit { requested: String, remaining: String },

    #[error("Over-application: requested {requested}, invoice balance {balance}")]
    OverApplication { requested: String, balance: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Credit is {status}; {operation} requires an available credit")]
    InvalidCreditState { status: String, operation: String },

    #[error("Reason is required for {0}")]
    MissingReason(String),

    #[error(transparent)]
    Invoicing(#[from] InvoicingError),

    #[error(transparent)]
    Money(#[from] MoneyError),
}
