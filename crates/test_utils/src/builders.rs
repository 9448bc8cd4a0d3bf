//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible
//! defaults. These builders allow tests to specify only the relevant fields
//! while using defaults for everything else.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{
    ActorId, AuditTrail, ClientId, Currency, Money, OrganizationId, PaymentId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use domain_credits::PaymentCredit;
use domain_invoicing::{Invoice, InvoiceLineItem, InvoiceStatus, TransitionOptions};

use crate::fixtures::{IdFixtures, MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for constructing test invoices
pub struct TestInvoiceBuilder {
    organization_id: OrganizationId,
    client_id: ClientId,
    invoice_number: String,
    currency: Currency,
    due_date: Option<NaiveDate>,
    items: Vec<InvoiceLineItem>,
}

impl Default for TestInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestInvoiceBuilder {
    /// Creates a new builder with one standard line item (2 x $100.00)
    pub fn new() -> Self {
        Self {
            organization_id: IdFixtures::organization(),
            client_id: IdFixtures::client(),
            invoice_number: "INV-2026-000001".to_string(),
            currency: Currency::USD,
            due_date: Some(TemporalFixtures::due_date()),
            items: vec![InvoiceLineItem::new(
                StringFixtures::accession_number(),
                StringFixtures::cpt_code(),
                dec!(2),
                MoneyFixtures::usd_100(),
            )],
        }
    }

    /// Sets the owning organization
    pub fn with_organization(mut self, id: OrganizationId) -> Self {
        self.organization_id = id;
        self
    }

    /// Sets the billed client
    pub fn with_client(mut self, id: ClientId) -> Self {
        self.client_id = id;
        self
    }

    /// Sets the invoice number
    pub fn with_invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = number.into();
        self
    }

    /// Sets the currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the due date
    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Replaces the default line items
    pub fn with_items(mut self, items: Vec<InvoiceLineItem>) -> Self {
        self.items = items;
        self
    }

    /// Appends one line item
    pub fn with_item(
        mut self,
        cpt_code: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
    ) -> Self {
        self.items.push(InvoiceLineItem::new(
            StringFixtures::accession_number(),
            cpt_code,
            quantity,
            unit_price,
        ));
        self
    }

    /// Builds a draft invoice
    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(
            self.organization_id,
            self.client_id,
            self.invoice_number,
            self.currency,
            self.due_date,
        );
        for item in self.items {
            invoice.add_item(item).unwrap();
        }
        invoice
    }

    /// Builds an invoice already sent with prices frozen
    ///
    /// The transition's audit entry lands in a throwaway trail; tests that
    /// assert on audit contents should transition explicitly instead.
    pub fn build_sent(self, actor: ActorId) -> Invoice {
        let mut invoice = self.build();
        let mut trail = AuditTrail::new();
        invoice
            .transition(
                InvoiceStatus::Sent,
                actor,
                TransitionOptions {
                    freeze_prices: true,
                },
                &mut trail,
            )
            .unwrap();
        invoice
    }
}

/// Builder for constructing test payment credits
pub struct TestCreditBuilder {
    payment_id: Option<PaymentId>,
    client_id: ClientId,
    amount: Money,
    notes: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Default for TestCreditBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCreditBuilder {
    /// Creates a new builder for a $100.00 credit with no expiry
    pub fn new() -> Self {
        Self {
            payment_id: Some(PaymentId::new()),
            client_id: IdFixtures::client(),
            amount: MoneyFixtures::usd_100(),
            notes: None,
            expires_at: None,
        }
    }

    /// Sets the originating payment
    pub fn with_payment(mut self, payment_id: Option<PaymentId>) -> Self {
        self.payment_id = payment_id;
        self
    }

    /// Sets the owning client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    /// Sets the credit amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Sets free-text notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the expiry timestamp
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builds the credit
    pub fn build(self) -> PaymentCredit {
        PaymentCredit::from_overpayment(
            self.payment_id,
            self.client_id,
            self.amount,
            self.notes,
            self.expires_at,
        )
        .unwrap()
    }
}
