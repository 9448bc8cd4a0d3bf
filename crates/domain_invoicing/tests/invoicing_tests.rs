//! Tests for the invoicing domain

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{
    ActorId, AuditAction, AuditTrail, AuditedEntity, ClientId, Currency, Money, OrganizationId,
    PaymentId,
};
use domain_invoicing::{
    Invoice, InvoiceLineItem, InvoiceStatus, InvoicingError, TransitionOptions,
};

fn usd(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

fn draft_invoice() -> Invoice {
    let mut invoice = Invoice::new(
        OrganizationId::new(),
        ClientId::new(),
        "INV-2026-000001",
        Currency::USD,
        NaiveDate::from_ymd_opt(2026, 9, 1),
    );
    invoice
        .add_item(InvoiceLineItem::new(
            "ACC-001",
            "80053",
            dec!(2),
            usd(dec!(100)),
        ))
        .unwrap();
    invoice
}

fn sent_invoice(trail: &mut AuditTrail) -> (Invoice, ActorId) {
    let actor = ActorId::new();
    let mut invoice = draft_invoice();
    invoice
        .transition(
            InvoiceStatus::Sent,
            actor,
            TransitionOptions {
                freeze_prices: true,
            },
            trail,
        )
        .unwrap();
    (invoice, actor)
}

// ============================================================================
// State machine tests
// ============================================================================

mod state_machine_tests {
    use super::*;

    /// Exercises every (from, to) pair against the transition table
    #[test]
    fn test_transition_matrix_is_exhaustive() {
        for from in InvoiceStatus::all() {
            for to in InvoiceStatus::all() {
                let mut trail = AuditTrail::new();
                let mut invoice = draft_invoice();
                invoice.status = *from;

                let result = invoice.transition(
                    *to,
                    ActorId::new(),
                    TransitionOptions::default(),
                    &mut trail,
                );

                if from.allowed_next().contains(to) {
                    assert!(result.is_ok(), "{from} -> {to} should succeed");
                    assert_eq!(invoice.status, *to);
                    assert_eq!(trail.len(), 1, "{from} -> {to} must audit once");
                } else {
                    assert!(
                        matches!(result, Err(InvoicingError::InvalidTransition { .. })),
                        "{from} -> {to} should fail"
                    );
                    assert_eq!(invoice.status, *from);
                    assert!(trail.is_empty(), "failed transition must not audit");
                }
            }
        }
    }

    #[test]
    fn test_transition_audit_records_from_and_to() {
        let mut trail = AuditTrail::new();
        let (invoice, _) = sent_invoice(&mut trail);

        let entries = trail.for_entity(AuditedEntity::Invoice, &invoice.id.to_string());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::StatusChanged);
        assert_eq!(entries[0].details["from"], "draft");
        assert_eq!(entries[0].details["to"], "sent");
    }

    #[test]
    fn test_draft_to_sent_freezes_prices() {
        let mut trail = AuditTrail::new();
        let (invoice, _) = sent_invoice(&mut trail);

        assert!(invoice.is_frozen());
        assert_eq!(invoice.total(), usd(dec!(200)));
        assert_eq!(invoice.frozen_total, Some(usd(dec!(200))));
    }

    #[test]
    fn test_send_without_freeze_option_keeps_prices_floating() {
        let mut trail = AuditTrail::new();
        let mut invoice = draft_invoice();
        invoice
            .transition(
                InvoiceStatus::Sent,
                ActorId::new(),
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();
        assert!(!invoice.is_frozen());
    }

    #[test]
    fn test_sent_at_is_set_once() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        let first_sent_at = invoice.sent_at.expect("sent_at set on send");

        // Bounce through disputed and back to sent
        invoice
            .transition(
                InvoiceStatus::Disputed,
                actor,
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();
        invoice
            .transition(
                InvoiceStatus::Sent,
                actor,
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();

        assert_eq!(invoice.sent_at, Some(first_sent_at));
    }

    #[test]
    fn test_paid_at_survives_repeated_paid_attempt() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        invoice
            .transition(
                InvoiceStatus::Paid,
                actor,
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();
        let paid_at = invoice.paid_at.expect("paid_at set");

        let result = invoice.transition(
            InvoiceStatus::Paid,
            actor,
            TransitionOptions::default(),
            &mut trail,
        );
        assert!(matches!(
            result,
            Err(InvoicingError::InvalidTransition { .. })
        ));
        assert_eq!(invoice.paid_at, Some(paid_at));
    }

    #[test]
    fn test_revert_to_draft_clears_lifecycle_state() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        invoice
            .transition(
                InvoiceStatus::Viewed,
                actor,
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();

        invoice
            .revert_to_draft(actor, "client requested correction", &mut trail)
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert!(invoice.sent_at.is_none());
        assert!(invoice.viewed_at.is_none());
        assert!(!invoice.is_frozen());

        let last = trail.entries().last().unwrap();
        assert_eq!(last.action, AuditAction::RevertedToDraft);
        assert_eq!(last.reason.as_deref(), Some("client requested correction"));
    }

    #[test]
    fn test_revert_to_draft_rejected_for_paid_and_cancelled() {
        for terminal in [InvoiceStatus::Paid, InvoiceStatus::Cancelled] {
            let mut trail = AuditTrail::new();
            let mut invoice = draft_invoice();
            invoice.status = terminal;

            let result = invoice.revert_to_draft(ActorId::new(), "mistake", &mut trail);
            assert!(matches!(
                result,
                Err(InvoicingError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_revert_to_draft_requires_reason() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        let result = invoice.revert_to_draft(actor, "  ", &mut trail);
        assert!(matches!(result, Err(InvoicingError::MissingReason(_))));
        assert_eq!(invoice.status, InvoiceStatus::Sent);
    }
}

// ============================================================================
// Edit guard tests
// ============================================================================

mod edit_guard_tests {
    use super::*;

    #[test]
    fn test_items_freely_editable_in_draft() {
        let mut invoice = draft_invoice();
        let item = InvoiceLineItem::new("ACC-002", "85025", dec!(1), usd(dec!(45)));
        let item_id = invoice.add_item(item).unwrap();

        invoice.update_item_price(item_id, usd(dec!(50))).unwrap();
        let removed = invoice.remove_item(item_id).unwrap();
        assert_eq!(removed.unit_price, usd(dec!(50)));
    }

    #[test]
    fn test_edits_rejected_once_sent() {
        let mut trail = AuditTrail::new();
        let (mut invoice, _) = sent_invoice(&mut trail);
        let existing = invoice.items[0].id;

        let add = invoice.add_item(InvoiceLineItem::new("ACC-003", "80061", dec!(1), usd(dec!(30))));
        assert!(matches!(add, Err(InvoicingError::ImmutableInvoice(_))));

        let update = invoice.update_item_price(existing, usd(dec!(1)));
        assert!(matches!(update, Err(InvoicingError::ImmutableInvoice(_))));

        let remove = invoice.remove_item(existing);
        assert!(matches!(remove, Err(InvoicingError::ImmutableInvoice(_))));
    }

    #[test]
    fn test_override_edit_requires_reason_and_audits() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        let item = InvoiceLineItem::new("ACC-004", "80076", dec!(1), usd(dec!(25)));

        let no_reason = invoice.add_item_with_override(item.clone(), actor, "", &mut trail);
        assert!(matches!(no_reason, Err(InvoicingError::MissingReason(_))));

        let audits_before = trail.len();
        invoice
            .add_item_with_override(item, actor, "late-arriving charge", &mut trail)
            .unwrap();
        assert_eq!(trail.len(), audits_before + 1);

        let last = trail.entries().last().unwrap();
        assert_eq!(last.action, AuditAction::FieldOverridden);
        assert_eq!(last.reason.as_deref(), Some("late-arriving charge"));
        assert_eq!(last.details["operation"], "add_item");
    }

    #[test]
    fn test_price_override_audit_captures_old_and_new() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        let item_id = invoice.items[0].id;

        invoice
            .update_item_price_with_override(
                item_id,
                usd(dec!(90)),
                actor,
                "contract reprice",
                &mut trail,
            )
            .unwrap();

        let entries = trail.for_entity(AuditedEntity::LineItem, &item_id.to_string());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["previous_unit_price"], "100");
        assert_eq!(entries[0].details["new_unit_price"], "90");
    }

    #[test]
    fn test_frozen_total_unchanged_by_override_edit() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        invoice
            .add_item_with_override(
                InvoiceLineItem::new("ACC-005", "99000", dec!(1), usd(dec!(500))),
                actor,
                "supplemental charge",
                &mut trail,
            )
            .unwrap();

        // The frozen snapshot is the billed amount until reverted to draft.
        assert_eq!(invoice.total(), usd(dec!(200)));
    }
}

// ============================================================================
// Payment and write-off tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[test]
    fn test_partial_payment_moves_to_partial() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        let excess = invoice
            .record_payment(PaymentId::new(), usd(dec!(80)), actor, &mut trail)
            .unwrap();

        assert!(excess.is_none());
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.balance(), usd(dec!(120)));
    }

    #[test]
    fn test_exact_payment_moves_to_paid() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        let excess = invoice
            .record_payment(PaymentId::new(), usd(dec!(200)), actor, &mut trail)
            .unwrap();

        assert!(excess.is_none());
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.paid_at.is_some());
        assert!(invoice.balance().is_zero());
    }

    #[test]
    fn test_overpayment_excess_is_returned_not_clamped() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        let excess = invoice
            .record_payment(PaymentId::new(), usd(dec!(250)), actor, &mut trail)
            .unwrap();

        assert_eq!(excess, Some(usd(dec!(50))));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.balance().is_zero());
        assert_eq!(invoice.amount_paid, usd(dec!(200)));
    }

    #[test]
    fn test_payment_rejected_on_draft_and_cancelled() {
        let mut trail = AuditTrail::new();
        let mut invoice = draft_invoice();

        let on_draft =
            invoice.record_payment(PaymentId::new(), usd(dec!(10)), ActorId::new(), &mut trail);
        assert!(matches!(on_draft, Err(InvoicingError::ImmutableInvoice(_))));

        invoice.status = InvoiceStatus::Cancelled;
        let on_cancelled =
            invoice.record_payment(PaymentId::new(), usd(dec!(10)), ActorId::new(), &mut trail);
        assert!(matches!(
            on_cancelled,
            Err(InvoicingError::ImmutableInvoice(_))
        ));
    }

    #[test]
    fn test_write_off_reduces_balance_and_audits() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        invoice
            .record_write_off(usd(dec!(40)), "uncollectable remainder", actor, &mut trail)
            .unwrap();

        assert_eq!(invoice.balance(), usd(dec!(160)));
        let last = trail.entries().last().unwrap();
        assert_eq!(last.action, AuditAction::WriteOffRecorded);
        assert_eq!(last.reason.as_deref(), Some("uncollectable remainder"));
    }

    #[test]
    fn test_write_off_cannot_exceed_balance() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);

        let result = invoice.record_write_off(usd(dec!(500)), "too much", actor, &mut trail);
        assert!(matches!(result, Err(InvoicingError::InvalidAmount(_))));
        assert_eq!(invoice.balance(), usd(dec!(200)));
    }
}

// ============================================================================
// Dispute tests
// ============================================================================

mod dispute_tests {
    use super::*;
    use domain_invoicing::DisputeResolution;

    #[test]
    fn test_dispute_lifecycle() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        let item_id = invoice.items[0].id;

        invoice
            .dispute_item(item_id, "quantity is wrong", actor, &mut trail)
            .unwrap();
        assert!(invoice.items[0].is_disputed);

        let reopen = invoice.dispute_item(item_id, "again", actor, &mut trail);
        assert!(matches!(reopen, Err(InvoicingError::AlreadyDisputed(_))));

        invoice
            .resolve_item_dispute(item_id, DisputeResolution::Rejected, actor, &mut trail)
            .unwrap();
        assert!(!invoice.items[0].is_disputed);
        assert!(invoice.items[0].dispute_resolved_at.is_some());

        let again = invoice.resolve_item_dispute(
            item_id,
            DisputeResolution::Rejected,
            actor,
            &mut trail,
        );
        assert!(matches!(again, Err(InvoicingError::NotDisputed(_))));
    }

    #[test]
    fn test_accepted_resolution_leaves_totals_unchanged() {
        let mut trail = AuditTrail::new();
        let (mut invoice, actor) = sent_invoice(&mut trail);
        let item_id = invoice.items[0].id;
        let total_before = invoice.total();

        invoice
            .dispute_item(item_id, "charge not authorized", actor, &mut trail)
            .unwrap();
        invoice
            .resolve_item_dispute(item_id, DisputeResolution::Accepted, actor, &mut trail)
            .unwrap();

        assert_eq!(invoice.total(), total_before);
        let last = trail.entries().last().unwrap();
        assert_eq!(last.action, AuditAction::DisputeResolved);
        assert_eq!(last.details["resolution"], "accepted");
    }
}

// ============================================================================
// Line item total tests
// ============================================================================

mod line_item_tests {
    use super::*;

    #[test]
    fn test_effective_total_derived_from_quantity_and_price() {
        let item = InvoiceLineItem::new("ACC-010", "80053", dec!(3), usd(dec!(12.50)));
        assert_eq!(item.effective_total(), usd(dec!(37.50)));
    }

    #[test]
    fn test_total_override_requires_reason() {
        let item = InvoiceLineItem::new("ACC-011", "80053", dec!(1), usd(dec!(100)));
        let no_reason = item.clone().with_total_override(usd(dec!(80)), " ");
        assert!(matches!(no_reason, Err(InvoicingError::MissingReason(_))));

        let overridden = item
            .with_total_override(usd(dec!(80)), "negotiated rate")
            .unwrap();
        assert_eq!(overridden.effective_total(), usd(dec!(80)));
        assert_eq!(
            overridden.total_override_reason.as_deref(),
            Some("negotiated rate")
        );
    }
}
