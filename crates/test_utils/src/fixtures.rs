//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the invoice
//! ledger. These fixtures are designed to be consistent and predictable for
//! unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{ActorId, ClientId, Currency, Money, OrganizationId};
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Creates a standard USD amount for testing
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    /// Creates the standard two-item invoice total
    pub fn usd_200() -> Money {
        Money::new(dec!(200.00), Currency::USD)
    }

    /// Creates a partial-payment amount against the standard total
    pub fn usd_150() -> Money {
        Money::new(dec!(150.00), Currency::USD)
    }

    /// Creates a small remainder amount
    pub fn usd_50() -> Money {
        Money::new(dec!(50.00), Currency::USD)
    }

    /// Creates a zero amount
    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// Creates a EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard invoice issue timestamp (Jan 15, 2026)
    pub fn issue_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
    }

    /// Standard due date (Feb 14, 2026)
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
    }

    /// A reference date exactly on the due date
    pub fn on_due_date() -> NaiveDate {
        Self::due_date()
    }

    /// A reference date 45 days past due
    pub fn forty_five_days_late() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    /// A credit expiry one year out
    pub fn credit_expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap()
    }

    /// A timestamp after every fixture expiry
    pub fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a fresh organization ID
    pub fn organization() -> OrganizationId {
        OrganizationId::new()
    }

    /// Creates a fresh client ID
    pub fn client() -> ClientId {
        ClientId::new()
    }

    /// Creates a fresh actor ID for audit attribution
    pub fn actor() -> ActorId {
        ActorId::new()
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// A typical accession number
    pub fn accession_number() -> &'static str {
        "ACC-2026-00418"
    }

    /// A typical CPT code
    pub fn cpt_code() -> &'static str {
        "80053"
    }

    /// A second CPT code for non-colliding items
    pub fn other_cpt_code() -> &'static str {
        "85025"
    }

    /// A typical override reason
    pub fn override_reason() -> &'static str {
        "re-run confirmed as distinct service"
    }
}
