//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{AuditAction, AuditTrail, Money};
use domain_invoicing::{Invoice, InvoiceStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than
/// tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: &Money) {
    assert!(
        money.is_positive(),
        "Expected positive money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: &Money) {
    assert!(
        money.is_negative(),
        "Expected negative money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts an invoice's current status
pub fn assert_invoice_status(invoice: &Invoice, expected: InvoiceStatus) {
    assert_eq!(
        invoice.status, expected,
        "Invoice {} expected status {}, got {}",
        invoice.invoice_number, expected, invoice.status
    );
}

/// Asserts how many entries with a given action the trail holds
pub fn assert_audit_count(trail: &AuditTrail, action: AuditAction, expected: usize) {
    let actual = trail
        .entries()
        .iter()
        .filter(|e| e.action == action)
        .count();
    assert_eq!(
        actual,
        expected,
        "Expected {} audit entries with action {:?}, found {} in a trail of {}",
        expected,
        action,
        actual,
        trail.len()
    );
}

/// Asserts the action of the most recent audit entry
pub fn assert_last_audit_action(trail: &AuditTrail, expected: AuditAction) {
    let last = trail
        .entries()
        .last()
        .unwrap_or_else(|| panic!("Expected audit trail to end with {:?}, but it is empty", expected));
    assert_eq!(
        last.action, expected,
        "Expected last audit action {:?}, got {:?}",
        expected, last.action
    );
}
