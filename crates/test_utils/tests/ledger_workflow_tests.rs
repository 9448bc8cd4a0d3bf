//! Cross-domain workflow tests
//!
//! Exercises full billing flows end to end: statement lifecycle with credit
//! reconciliation, overpayment routing into new credits, and duplicate
//! review feeding approved charges back into a locked invoice.

use chrono::NaiveDate;
use core_kernel::{AuditAction, AuditTrail, Currency, PaymentId};
use domain_credits::CreditLedger;
use domain_invoicing::{bucketize_aging, AgingBucket, InvoiceStatus, TransitionOptions};
use domain_review::{DuplicateKey, ReviewQueue};
use rust_decimal_macros::dec;
use test_utils::{
    assert_audit_count, assert_invoice_status, assert_money_zero, IdFixtures, MoneyFixtures,
    StringFixtures, TemporalFixtures, TestCreditBuilder, TestInvoiceBuilder,
};

mod lifecycle_with_credits {
    use super::*;

    #[test]
    fn test_statement_settled_by_two_credit_applications() {
        let actor = IdFixtures::actor();
        let client = IdFixtures::client();
        let mut trail = AuditTrail::new();

        // One item, 2 x $100.00.
        let mut invoice = TestInvoiceBuilder::new().with_client(client).build();
        assert_eq!(invoice.total(), MoneyFixtures::usd_200());

        invoice
            .transition(
                InvoiceStatus::Sent,
                actor,
                TransitionOptions { freeze_prices: true },
                &mut trail,
            )
            .unwrap();
        assert!(invoice.is_frozen());
        assert_eq!(invoice.frozen_total, Some(MoneyFixtures::usd_200()));

        let mut ledger = CreditLedger::new();
        let first = ledger
            .create_from_overpayment(
                Some(PaymentId::new()),
                client,
                MoneyFixtures::usd_150(),
                None,
                None,
                actor,
                &mut trail,
            )
            .unwrap();
        let second = ledger
            .create_from_overpayment(
                Some(PaymentId::new()),
                client,
                MoneyFixtures::usd_50(),
                None,
                None,
                actor,
                &mut trail,
            )
            .unwrap();

        ledger
            .apply_to_invoice(first, &mut invoice, None, actor, &mut trail)
            .unwrap();
        assert_eq!(invoice.balance(), MoneyFixtures::usd_50());

        ledger
            .apply_to_invoice(second, &mut invoice, None, actor, &mut trail)
            .unwrap();
        assert_money_zero(&invoice.balance());

        invoice
            .transition(
                InvoiceStatus::Paid,
                actor,
                TransitionOptions::default(),
                &mut trail,
            )
            .unwrap();
        assert_invoice_status(&invoice, InvoiceStatus::Paid);
        let paid_at = invoice.paid_at;
        assert!(paid_at.is_some());

        // Re-marking paid is rejected and the timestamp stays put.
        let err = invoice.transition(
            InvoiceStatus::Paid,
            actor,
            TransitionOptions::default(),
            &mut trail,
        );
        assert!(err.is_err());
        assert_eq!(invoice.paid_at, paid_at);

        assert_audit_count(&trail, AuditAction::CreditApplied, 2);
        assert_audit_count(&trail, AuditAction::StatusChanged, 2);
    }

    #[test]
    fn test_frozen_total_survives_draft_price_drift() {
        let actor = IdFixtures::actor();
        let mut invoice = TestInvoiceBuilder::new().build_sent(actor);

        // Current item data no longer matters once the snapshot exists.
        assert_eq!(invoice.total(), MoneyFixtures::usd_200());
        assert_eq!(invoice.subtotal(), MoneyFixtures::usd_200());
    }
}

mod overpayment_routing {
    use super::*;

    #[test]
    fn test_overpayment_becomes_credit_for_next_invoice() {
        let actor = IdFixtures::actor();
        let client = IdFixtures::client();
        let mut trail = AuditTrail::new();

        let mut invoice = TestInvoiceBuilder::new()
            .with_client(client)
            .build_sent(actor);

        // $250.00 against a $200.00 invoice.
        let payment_id = PaymentId::new();
        let excess = invoice
            .record_payment(
                payment_id,
                MoneyFixtures::usd_200() + MoneyFixtures::usd_50(),
                actor,
                &mut trail,
            )
            .unwrap();
        assert_eq!(excess, Some(MoneyFixtures::usd_50()));
        assert_invoice_status(&invoice, InvoiceStatus::Paid);
        assert_eq!(invoice.amount_paid, MoneyFixtures::usd_200());
        assert_money_zero(&invoice.balance());

        let mut ledger = CreditLedger::new();
        let credit_id = ledger
            .create_from_overpayment(
                Some(payment_id),
                client,
                excess.unwrap(),
                Some("overpayment".to_string()),
                None,
                actor,
                &mut trail,
            )
            .unwrap();

        let mut next = TestInvoiceBuilder::new()
            .with_client(client)
            .with_invoice_number("INV-2026-000002")
            .build_sent(actor);
        ledger
            .apply_to_invoice(credit_id, &mut next, None, actor, &mut trail)
            .unwrap();
        assert_eq!(next.balance(), MoneyFixtures::usd_150());
        assert_eq!(next.applied_credits, MoneyFixtures::usd_50());
    }

    #[test]
    fn test_expiry_sweep_counts_only_this_call() {
        let actor = IdFixtures::actor();
        let mut trail = AuditTrail::new();
        let mut ledger = CreditLedger::new();

        ledger.register(
            TestCreditBuilder::new()
                .with_expiry(TemporalFixtures::credit_expiry())
                .build(),
        );
        ledger.register(TestCreditBuilder::new().build()); // no expiry

        let expired = ledger.expire_old_credits(TemporalFixtures::far_future(), actor, &mut trail);
        assert_eq!(expired, 1);

        // Second sweep over the same data finds nothing new.
        let expired = ledger.expire_old_credits(TemporalFixtures::far_future(), actor, &mut trail);
        assert_eq!(expired, 0);
        assert_audit_count(&trail, AuditAction::CreditExpired, 1);
    }
}

mod duplicate_review_to_billing {
    use super::*;

    #[test]
    fn test_approved_duplicate_lands_on_locked_invoice_with_audit() {
        let actor = IdFixtures::actor();
        let org = IdFixtures::organization();
        let mut trail = AuditTrail::new();

        let mut invoice = TestInvoiceBuilder::new()
            .with_organization(org)
            .build_sent(actor);

        let mut queue = ReviewQueue::new();
        let candidate_id = queue.flag(
            DuplicateKey::new(
                org,
                StringFixtures::accession_number(),
                StringFixtures::cpt_code(),
            ),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            MoneyFixtures::usd_100(),
            dec!(1),
        );

        let charge = queue
            .approve(
                candidate_id,
                actor,
                StringFixtures::override_reason(),
                &mut trail,
            )
            .unwrap();

        let item = charge.into_line_item();
        assert!(item.is_override);

        invoice
            .add_item_with_override(item, actor, StringFixtures::override_reason(), &mut trail)
            .unwrap();

        // One entry for the approval, one for the locked-invoice edit.
        assert_audit_count(&trail, AuditAction::DuplicateApproved, 1);
        assert_audit_count(&trail, AuditAction::FieldOverridden, 1);

        // The sent snapshot is untouched by the late item.
        assert_eq!(invoice.total(), MoneyFixtures::usd_200());
    }
}

mod aging_report {
    use super::*;

    #[test]
    fn test_outstanding_invoices_bucket_by_days_late() {
        let actor = IdFixtures::actor();
        let as_of = TemporalFixtures::forty_five_days_late();

        let on_time = TestInvoiceBuilder::new()
            .with_due_date(Some(as_of))
            .build_sent(actor);
        let late = TestInvoiceBuilder::new()
            .with_due_date(Some(TemporalFixtures::due_date()))
            .build_sent(actor);

        let entries = vec![on_time.aging_entry(), late.aging_entry()];
        let report = bucketize_aging(&entries, as_of, Currency::USD);

        assert_eq!(
            report.bucket_total(AgingBucket::Current),
            MoneyFixtures::usd_200()
        );
        assert_eq!(
            report.bucket_total(AgingBucket::Days31To60),
            MoneyFixtures::usd_200()
        );
        assert_eq!(
            report.total(),
            MoneyFixtures::usd_200() + MoneyFixtures::usd_200()
        );
    }
}
