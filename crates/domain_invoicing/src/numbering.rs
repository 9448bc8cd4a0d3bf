//! Invoice numbering
//!
//! Sequential numbers are issued per organization per year from a durable
//! counter (the atomic increment lives in the database adapter). When the
//! durable counter is unreachable, a fallback identifier is issued instead;
//! it is explicitly tagged so reconciliation can find and replace it, and
//! it can never be mistaken for a sequential number.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use core_kernel::OrganizationId;

use crate::error::InvoicingError;

/// The scope a counter is unique within: one organization, one year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterScope {
    pub organization_id: OrganizationId,
    pub year: i32,
}

impl CounterScope {
    /// Creates a scope for the given organization and year
    pub fn new(organization_id: OrganizationId, year: i32) -> Self {
        Self {
            organization_id,
            year,
        }
    }

    /// Creates a scope for the current year
    pub fn current_year(organization_id: OrganizationId) -> Self {
        Self::new(organization_id, Utc::now().year())
    }

    /// The storage key for this scope
    pub fn key(&self) -> String {
        format!("{}:{}", self.organization_id, self.year)
    }
}

impl fmt::Display for CounterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A number issued for an invoice
///
/// `Fallback` numbers are issued only when the durable counter is
/// unavailable; the variant is the marker downstream reconciliation keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssuedNumber {
    /// A value from the per-scope atomic counter
    Sequential { value: i64, formatted: String },
    /// A timestamp-plus-random identifier issued while the counter was down
    Fallback { formatted: String },
}

impl IssuedNumber {
    /// Creates a sequential number from a counter value
    pub fn sequential(scope: CounterScope, value: i64) -> Self {
        IssuedNumber::Sequential {
            value,
            formatted: format_sequential(scope, value),
        }
    }

    /// Generates a tagged fallback identifier
    pub fn fallback(scope: CounterScope) -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = &Uuid::new_v4().simple().to_string()[..6];
        IssuedNumber::Fallback {
            formatted: format!("FB-{}-{}-{}", scope.year, millis, suffix),
        }
    }

    /// The formatted invoice number
    pub fn formatted(&self) -> &str {
        match self {
            IssuedNumber::Sequential { formatted, .. } => formatted,
            IssuedNumber::Fallback { formatted } => formatted,
        }
    }

    /// True when this number needs later reconciliation
    pub fn is_fallback(&self) -> bool {
        matches!(self, IssuedNumber::Fallback { .. })
    }
}

impl fmt::Display for IssuedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Formats a sequential counter value as an invoice number
pub fn format_sequential(scope: CounterScope, value: i64) -> String {
    format!("INV-{}-{:06}", scope.year, value)
}

/// Read-only counter state: the next value without consuming it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterStatus {
    pub scope_key: String,
    pub year: i32,
    pub last_value: i64,
}

impl CounterStatus {
    /// The value the next issuance will return
    pub fn next_value(&self) -> i64 {
        self.last_value + 1
    }
}

/// Validates an administrative counter reset
///
/// The counter may only move forward; a reset can never cause a previously
/// issued value to be issued again.
pub fn validate_reset(current_last: i64, new_value: i64) -> Result<(), InvoicingError> {
    if new_value <= current_last {
        return Err(InvoicingError::CounterMovedBackward {
            current: current_last,
            requested: new_value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> CounterScope {
        CounterScope::new(OrganizationId::new(), 2026)
    }

    #[test]
    fn test_sequential_formatting() {
        let number = IssuedNumber::sequential(scope(), 42);
        assert_eq!(number.formatted(), "INV-2026-000042");
        assert!(!number.is_fallback());
    }

    #[test]
    fn test_fallback_is_tagged_and_distinguishable() {
        let number = IssuedNumber::fallback(scope());
        assert!(number.is_fallback());
        assert!(number.formatted().starts_with("FB-2026-"));
        // A fallback can never parse as a sequential number
        assert!(!number.formatted().starts_with("INV-"));
    }

    #[test]
    fn test_fallback_numbers_are_unique() {
        let a = IssuedNumber::fallback(scope());
        let b = IssuedNumber::fallback(scope());
        assert_ne!(a.formatted(), b.formatted());
    }

    #[test]
    fn test_validate_reset_forward_only() {
        assert!(validate_reset(10, 11).is_ok());
        assert!(validate_reset(10, 100).is_ok());
        assert!(matches!(
            validate_reset(10, 10),
            Err(InvoicingError::CounterMovedBackward { .. })
        ));
        assert!(matches!(
            validate_reset(10, 3),
            Err(InvoicingError::CounterMovedBackward { .. })
        ));
    }

    #[test]
    fn test_counter_status_preview_does_not_consume() {
        let status = CounterStatus {
            scope_key: scope().key(),
            year: 2026,
            last_value: 7,
        };
        assert_eq!(status.next_value(), 8);
        assert_eq!(status.next_value(), 8);
    }
}
