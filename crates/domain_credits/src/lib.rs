//! Credits Domain - overpayment credits and reconciliation
//!
//! Credits are created from overpayments, applied to invoices, expired by a
//! scheduled sweep, or cancelled back to the client. The credit decrement
//! and the application record are one unit of work; a credit is never
//! decremented without a corresponding application.

pub mod application;
pub mod credit;
pub mod error;
pub mod ledger;

pub use application::CreditApplication;
pub use credit::{CreditStatus, PaymentCredit};
pub use error::CreditError;
pub use ledger::{ClientCreditSummary, CreditLedger};
