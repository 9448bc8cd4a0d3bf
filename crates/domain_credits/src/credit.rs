//! Payment credit aggregate
//!
//! A credit is a reusable balance created from an overpayment. While it is
//! `available`, `remaining_amount` only ever decreases; it is bounded by
//! `0 <= remaining_amount <= amount` at all times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, CreditId, Money, PaymentId};

use crate::error::CreditError;

/// Credit lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    /// Has remaining balance to apply
    Available,
    /// Fully consumed by applications
    Applied,
    /// Passed its expiry date unused
    Expired,
    /// Cancelled and returned to the client
    Refunded,
}

impl CreditStatus {
    /// Returns the status name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Available => "available",
            CreditStatus::Applied => "applied",
            CreditStatus::Expired => "expired",
            CreditStatus::Refunded => "refunded",
        }
    }

    /// Parses a stored status name
    pub fn parse(s: &str) -> Option<CreditStatus> {
        match s {
            "available" => Some(CreditStatus::Available),
            "applied" => Some(CreditStatus::Applied),
            "expired" => Some(CreditStatus::Expired),
            "refunded" => Some(CreditStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reusable monetary credit created from an overpayment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCredit {
    /// Unique identifier
    pub id: CreditId,
    /// The payment whose overpayment created this credit, when known
    pub payment_id: Option<PaymentId>,
    /// The client the credit belongs to
    pub client_id: ClientId,
    /// Original credit amount
    pub amount: Money,
    /// Unapplied remainder
    pub remaining_amount: Money,
    /// Lifecycle status
    pub status: CreditStatus,
    /// When the credit lapses if unused
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form notes from creation
    pub notes: Option<String>,
    /// Record timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentCredit {
    /// Creates a credit from an overpayment
    ///
    /// Fails when the amount is not positive.
    pub fn from_overpayment(
        payment_id: Option<PaymentId>,
        client_id: ClientId,
        amount: Money,
        notes: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, CreditError> {
        if !amount.is_positive() {
            return Err(CreditError::InvalidAmount(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: CreditId::new_v7(),
            payment_id,
            client_id,
            amount,
            remaining_amount: amount,
            status: CreditStatus::Available,
            expires_at,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_available(&self, operation: &str) -> Result<(), CreditError> {
        if self.status != CreditStatus::Available {
            return Err(CreditError::InvalidCreditState {
                status: self.status.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Draws an amount down from the remaining balance
    ///
    /// Fails with `InsufficientCredit` when the draw exceeds the remainder;
    /// the remainder is untouched on failure. A fully drawn credit moves to
    /// `applied`.
    pub fn draw(&mut self, amount: Money) -> Result<(), CreditError> {
        self.ensure_available("draw")?;
        if !amount.is_positive() {
            return Err(CreditError::InvalidAmount(format!(
                "draw amount must be positive, got {amount}"
            )));
        }
        if amount > self.remaining_amount {
            return Err(CreditError::InsufficientCredit {
                requested: amount.to_string(),
                remaining: self.remaining_amount.to_string(),
            });
        }

        self.remaining_amount = self.remaining_amount.checked_sub(&amount)?;
        if self.remaining_amount.is_zero() {
            self.status = CreditStatus::Applied;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// True when the credit is available and past its expiry date
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        self.status == CreditStatus::Available
            && self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Expires the credit; returns false when nothing changed
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_expirable(now) {
            return false;
        }
        self.status = CreditStatus::Expired;
        self.updated_at = now;
        true
    }

    /// Cancels an available credit, marking it refunded
    pub fn cancel(&mut self) -> Result<(), CreditError> {
        self.ensure_available("cancel")?;
        self.status = CreditStatus::Refunded;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn credit(amount: Money) -> PaymentCredit {
        PaymentCredit::from_overpayment(Some(PaymentId::new()), ClientId::new(), amount, None, None)
            .unwrap()
    }

    #[test]
    fn test_creation_rejects_non_positive_amounts() {
        for bad in [usd(dec!(0)), usd(dec!(-10))] {
            let result = PaymentCredit::from_overpayment(None, ClientId::new(), bad, None, None);
            assert!(matches!(result, Err(CreditError::InvalidAmount(_))));
        }
    }

    #[test]
    fn test_draw_decrements_and_closes_at_zero() {
        let mut c = credit(usd(dec!(50)));
        c.draw(usd(dec!(20))).unwrap();
        assert_eq!(c.remaining_amount, usd(dec!(30)));
        assert_eq!(c.status, CreditStatus::Available);

        c.draw(usd(dec!(30))).unwrap();
        assert!(c.remaining_amount.is_zero());
        assert_eq!(c.status, CreditStatus::Applied);
    }

    #[test]
    fn test_overdraw_leaves_remaining_unchanged() {
        let mut c = credit(usd(dec!(50)));
        let result = c.draw(usd(dec!(80)));
        assert!(matches!(result, Err(CreditError::InsufficientCredit { .. })));
        assert_eq!(c.remaining_amount, usd(dec!(50)));
        assert_eq!(c.status, CreditStatus::Available);
    }

    #[test]
    fn test_expire_only_when_past_expiry() {
        let now = Utc::now();
        let mut unexpiring = credit(usd(dec!(10)));
        assert!(!unexpiring.expire(now));

        let mut expiring = PaymentCredit::from_overpayment(
            None,
            ClientId::new(),
            usd(dec!(10)),
            None,
            Some(now - chrono::Duration::days(1)),
        )
        .unwrap();
        assert!(expiring.expire(now));
        assert_eq!(expiring.status, CreditStatus::Expired);
        // Second expiry is a no-op
        assert!(!expiring.expire(now));
    }

    #[test]
    fn test_cancel_only_from_available() {
        let mut c = credit(usd(dec!(10)));
        c.cancel().unwrap();
        assert_eq!(c.status, CreditStatus::Refunded);

        let result = c.cancel();
        assert!(matches!(result, Err(CreditError::InvalidCreditState { .. })));
    }
}
