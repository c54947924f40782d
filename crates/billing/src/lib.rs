//! Billing domain module (invoices, line items, payments, statements).
//!
//! This crate contains the business rules for what students owe and what has
//! been paid, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). The statement arithmetic lives here exactly once so
//! every store backend computes balances the same way.

pub mod invoice;
pub mod payment;
pub mod statement;

pub use invoice::{Invoice, InvoiceItem, InvoiceStatus};
pub use payment::{Payment, validate_amount};
pub use statement::{
    InvoiceBalance, SchoolStatement, StatementPeriod, StatementRow, StatementTotals,
    StudentStatement, balance_for, check_payment_fits, sort_rows,
};
