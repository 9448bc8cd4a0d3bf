//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::NaiveDate;
use core_kernel::{Currency, Money};
use domain_invoicing::InvoiceStatus;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::CAD),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating valid amount ranges
pub fn amount_minor_strategy() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..1_000_000_000i64
}

/// Strategy for generating valid Money values with positive amounts
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating valid Money values (can be negative)
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating valid USD Money values
pub fn usd_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::USD))
}

/// Strategy for generating line item quantities
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000i64).prop_map(Decimal::from)
}

/// Strategy for generating any invoice status
pub fn invoice_status_strategy() -> impl Strategy<Value = InvoiceStatus> {
    prop_oneof![
        Just(InvoiceStatus::Draft),
        Just(InvoiceStatus::Sent),
        Just(InvoiceStatus::Viewed),
        Just(InvoiceStatus::Partial),
        Just(InvoiceStatus::Paid),
        Just(InvoiceStatus::Overdue),
        Just(InvoiceStatus::Disputed),
        Just(InvoiceStatus::Cancelled),
    ]
}

/// Strategy for generating plausible due dates across several years
pub fn due_date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2024i32..2028i32, 1u32..13u32, 1u32..29u32)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}
