//! Invoice status state machine
//!
//! The full transition table lives in one place ([`InvoiceStatus::allowed_next`])
//! and every status change in the system is validated through it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being drafted; line items freely editable
    Draft,
    /// Sent to the client; prices frozen
    Sent,
    /// Client has opened the invoice
    Viewed,
    /// Partial payment received
    Partial,
    /// Fully paid
    Paid,
    /// Past due date
    Overdue,
    /// Under client dispute
    Disputed,
    /// Cancelled/voided (terminal)
    Cancelled,
}

impl InvoiceStatus {
    /// Returns the set of statuses this status may transition to
    pub fn allowed_next(&self) -> &'static [InvoiceStatus] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Viewed, Partial, Paid, Overdue, Disputed, Cancelled],
            Viewed => &[Partial, Paid, Overdue, Disputed, Cancelled],
            Partial => &[Paid, Overdue, Disputed, Cancelled],
            Paid => &[Disputed],
            Overdue => &[Partial, Paid, Disputed, Cancelled],
            Disputed => &[Sent, Paid, Cancelled],
            Cancelled => &[],
        }
    }

    /// Checks whether a transition to `target` is allowed
    pub fn can_transition_to(&self, target: InvoiceStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    /// True for statuses with no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// All statuses, for exhaustive table checks
    pub fn all() -> &'static [InvoiceStatus] {
        use InvoiceStatus::*;
        &[
            Draft, Sent, Viewed, Partial, Paid, Overdue, Disputed, Cancelled,
        ]
    }

    /// Returns the status name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Disputed => "disputed",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name
    pub fn parse(s: &str) -> Option<InvoiceStatus> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "viewed" => Some(InvoiceStatus::Viewed),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "disputed" => Some(InvoiceStatus::Disputed),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_terminal() {
        assert!(InvoiceStatus::Cancelled.is_terminal());
        for status in InvoiceStatus::all() {
            if *status != InvoiceStatus::Cancelled {
                assert!(!status.is_terminal(), "{status} should not be terminal");
            }
        }
    }

    #[test]
    fn test_paid_only_reaches_disputed() {
        assert_eq!(
            InvoiceStatus::Paid.allowed_next(),
            &[InvoiceStatus::Disputed]
        );
    }

    #[test]
    fn test_status_name_round_trip() {
        for status in InvoiceStatus::all() {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(InvoiceStatus::parse("unknown"), None);
    }
}
