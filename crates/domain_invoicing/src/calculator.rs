//! Pure ledger calculations
//!
//! Totals, balances, and aging buckets. No side effects and no storage
//! dependency; callers decide what to do with the results (a negative
//! balance signals an overpayment that must be routed to credit creation,
//! never clamped here).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, InvoiceId, Money};

use crate::invoice::InvoiceLineItem;

/// Sums the authoritative total of each line item
///
/// Falls back to `quantity x unit_price` for items without an explicit
/// total override.
pub fn compute_total(items: &[InvoiceLineItem], currency: Currency) -> Money {
    items
        .iter()
        .fold(Money::zero(currency), |acc, item| acc + item.effective_total())
}

/// Computes the outstanding balance of an invoice
///
/// `total - paid - applied_credits - write_off`. The result may be
/// negative; that is the overpayment signal.
pub fn compute_balance(
    total: Money,
    paid: Money,
    applied_credits: Money,
    write_off: Money,
) -> Money {
    total - paid - applied_credits - write_off
}

/// Aging buckets for outstanding balance
///
/// Boundaries are inclusive at the upper edge: exactly 30 days overdue is
/// `Days1To30`, exactly 31 is `Days31To60`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    /// Classifies a due date relative to an as-of date
    ///
    /// A due date on or after `as_of` is `Current`.
    pub fn classify(due_date: NaiveDate, as_of: NaiveDate) -> AgingBucket {
        let days_overdue = (as_of - due_date).num_days();
        match days_overdue {
            d if d <= 0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    /// Human-readable bucket label for collections reporting
    pub fn label(&self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }
}

/// One outstanding invoice position to be aged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingEntry {
    pub invoice_id: InvoiceId,
    pub due_date: Option<NaiveDate>,
    pub outstanding: Money,
}

/// Per-bucket totals over a set of outstanding positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub current: Money,
    pub days_1_30: Money,
    pub days_31_60: Money,
    pub days_61_90: Money,
    pub over_90: Money,
}

impl AgingReport {
    fn empty(as_of: NaiveDate, currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            as_of,
            current: zero,
            days_1_30: zero,
            days_31_60: zero,
            days_61_90: zero,
            over_90: zero,
        }
    }

    /// Returns the total for one bucket
    pub fn bucket_total(&self, bucket: AgingBucket) -> Money {
        match bucket {
            AgingBucket::Current => self.current,
            AgingBucket::Days1To30 => self.days_1_30,
            AgingBucket::Days31To60 => self.days_31_60,
            AgingBucket::Days61To90 => self.days_61_90,
            AgingBucket::Over90 => self.over_90,
        }
    }

    /// Returns the sum across all buckets
    pub fn total(&self) -> Money {
        self.current + self.days_1_30 + self.days_31_60 + self.days_61_90 + self.over_90
    }

    fn add(&mut self, bucket: AgingBucket, amount: Money) {
        let slot = match bucket {
            AgingBucket::Current => &mut self.current,
            AgingBucket::Days1To30 => &mut self.days_1_30,
            AgingBucket::Days31To60 => &mut self.days_31_60,
            AgingBucket::Days61To90 => &mut self.days_61_90,
            AgingBucket::Over90 => &mut self.over_90,
        };
        *slot = *slot + amount;
    }
}

/// Assigns each outstanding entry to exactly one aging bucket
///
/// Entries that are fully paid (zero or negative outstanding) or have no
/// known due date are skipped; every other entry lands in exactly one
/// bucket, so the buckets are mutually exclusive and exhaustive over the
/// outstanding balance.
pub fn bucketize_aging(entries: &[AgingEntry], as_of: NaiveDate, currency: Currency) -> AgingReport {
    let mut report = AgingReport::empty(as_of, currency);
    for entry in entries {
        if !entry.outstanding.is_positive() {
            continue;
        }
        let Some(due_date) = entry.due_date else {
            continue;
        };
        report.add(AgingBucket::classify(due_date, as_of), entry.outstanding);
    }
    report
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every dated positive entry lands in exactly one bucket, and the
        /// bucket totals always fold back to the outstanding sum.
        #[test]
        fn buckets_are_exhaustive_and_exclusive(
            offsets in proptest::collection::vec(-120i64..400i64, 0..40),
        ) {
            let as_of = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
            let entries: Vec<AgingEntry> = offsets
                .iter()
                .map(|days_overdue| AgingEntry {
                    invoice_id: InvoiceId::new(),
                    due_date: Some(as_of - chrono::Duration::days(*days_overdue)),
                    outstanding: Money::from_minor(1000, Currency::USD),
                })
                .collect();

            let report = bucketize_aging(&entries, as_of, Currency::USD);
            let expected = Money::from_minor(1000 * entries.len() as i64, Currency::USD);
            prop_assert_eq!(report.total(), expected);
        }
    }
}
