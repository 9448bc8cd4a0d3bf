//! Infrastructure Database Layer
//!
//! This crate provides the database infrastructure for the invoice ledger,
//! implemented on PostgreSQL using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern, providing data access
//! abstractions that hide the database implementation details from the
//! domain layer. Two properties hold across every repository:
//!
//! - **Audit coupling**: a mutation and the audit entries describing it
//!   commit in the same transaction, or not at all.
//! - **Optimistic concurrency**: updates are guarded by the state the
//!   caller read (invoice status, credit remaining amount, candidate
//!   pending flag); a lost race surfaces as
//!   [`DatabaseError::ConcurrentModification`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, InvoiceRepository};
//!
//! let pool = create_pool_from_url("postgres://localhost/invoicing").await?;
//! let repo = InvoiceRepository::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::{retry_once, DatabaseError};
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{
    AuditRepository, CreditRepository, InvoiceRepository, NumberingRepository, ReviewRepository,
};
