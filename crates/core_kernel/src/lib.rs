//! Core Kernel - Foundational types for the invoice ledger
//!
//! This crate provides the building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - The append-only audit trail every ledger mutation records through

pub mod audit;
pub mod identifiers;
pub mod money;

pub use audit::{AuditAction, AuditEntry, AuditTrail, AuditedEntity};
pub use identifiers::{
    ActorId, AuditEntryId, CandidateId, ClientId, CreditApplicationId, CreditId, InvoiceId,
    LineItemId, OrganizationId, PaymentId,
};
pub use money::{Currency, Money, MoneyError};
