//! Repository implementations for domain entities
//!
//! This module provides concrete repository implementations that handle
//! database access for each domain aggregate. Repositories encapsulate
//! SQL queries and map between database rows and domain types.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Every aggregate mutation and its audit entries commit in one transaction
//! - Optimistic concurrency checks on status or remaining-amount columns
//! - Row structs at the database boundary, domain types everywhere else

pub mod audit;
pub mod credits;
pub mod invoices;
pub mod numbering;
pub mod review;

pub use audit::AuditRepository;
pub use credits::CreditRepository;
pub use invoices::InvoiceRepository;
pub use numbering::NumberingRepository;
pub use review::ReviewRepository;

use crate::error::DatabaseError;

/// Maps an SQLx error to its classified [`DatabaseError`] variant
pub(crate) fn classify(error: sqlx::Error) -> DatabaseError {
    DatabaseError::from(&error)
}
