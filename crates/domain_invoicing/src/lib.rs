//! Invoicing Domain - invoice lifecycle, ledger calculations, numbering
//!
//! This crate owns the pieces of the billing core where incorrect behavior
//! double-bills or silently loses money:
//!
//! - The invoice status state machine, with one explicit transition table
//!   checked at a single chokepoint
//! - Pure ledger calculations: totals, balances, aging buckets
//! - Per-scope invoice numbering types, including the tagged fallback
//!   identifier used when the durable counter is unreachable
//!
//! Every override and status change appends exactly one audit entry in the
//! same unit of work.

pub mod calculator;
pub mod error;
pub mod invoice;
pub mod numbering;
pub mod status;

pub use calculator::{bucketize_aging, compute_balance, compute_total, AgingBucket, AgingEntry, AgingReport};
pub use error::InvoicingError;
pub use invoice::{DisputeResolution, Invoice, InvoiceLineItem, TransitionOptions};
pub use numbering::{format_sequential, validate_reset, CounterScope, CounterStatus, IssuedNumber};
pub use status::InvoiceStatus;
