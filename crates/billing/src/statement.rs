//! Statement and balance computation.
//!
//! Everything here is pure: the stores fetch rows and payment sums, this
//! module turns them into balances. `paid` is clamped to the invoice total,
//! cancelled invoices always report zero pending, and rows are ordered by
//! issue date with ties broken by identifier so statements are deterministic.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use campusbill_core::{
    DomainError, DomainResult, InvoiceId, SchoolId, StudentId, ValueObject, money,
};

use crate::invoice::InvoiceStatus;

/// Paid/pending snapshot for one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBalance {
    pub total: Decimal,
    pub paid: Decimal,
    pub pending: Decimal,
}

impl ValueObject for InvoiceBalance {}

/// Compute one invoice's balance from its total and its active-payment sum.
///
/// `paid = min(sum(payments), total)`; `pending = total - paid`, except that
/// cancelled invoices always report `pending = 0.00` while keeping their paid
/// history visible.
pub fn balance_for(
    status: InvoiceStatus,
    total: Decimal,
    payments_total: Decimal,
) -> InvoiceBalance {
    let paid = payments_total.min(total);
    let pending = match status {
        InvoiceStatus::Active => total - paid,
        InvoiceStatus::Cancelled => Decimal::ZERO,
    };
    InvoiceBalance {
        total,
        paid,
        pending,
    }
}

/// The overpayment gate: would `amount` push the paid sum past the total?
///
/// Exact decimal ordering, never epsilon comparison. On rejection the error
/// carries how much the invoice can still absorb.
pub fn check_payment_fits(
    total: Decimal,
    already_paid: Decimal,
    amount: Decimal,
) -> DomainResult<()> {
    let candidate = money::checked_money_add(already_paid, amount, "paid total")?;
    if candidate > total {
        let remaining = (total - already_paid).max(Decimal::new(0, money::MONEY_SCALE));
        return Err(DomainError::overpayment(remaining));
    }
    Ok(())
}

/// One invoice line of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRow {
    pub invoice_id: InvoiceId,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub balance: InvoiceBalance,
}

impl ValueObject for StatementRow {}

/// Deterministic statement ordering: issue date ascending, ties by id.
pub fn sort_rows(rows: &mut [StatementRow]) {
    rows.sort_by(|a, b| {
        a.issue_date
            .cmp(&b.issue_date)
            .then_with(|| a.invoice_id.cmp(&b.invoice_id))
    });
}

/// Entity-level totals over a set of statement rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTotals {
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub total_pending: Decimal,
}

impl ValueObject for StatementTotals {}

impl StatementTotals {
    pub fn zero() -> Self {
        Self {
            total_billed: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            total_pending: Decimal::ZERO,
        }
    }

    pub fn from_rows(rows: &[StatementRow]) -> DomainResult<Self> {
        let mut totals = Self::zero();
        for row in rows {
            totals.total_billed =
                money::checked_money_add(totals.total_billed, row.balance.total, "billed total")?;
            totals.total_paid =
                money::checked_money_add(totals.total_paid, row.balance.paid, "paid total")?;
            totals.total_pending = money::checked_money_add(
                totals.total_pending,
                row.balance.pending,
                "pending total",
            )?;
        }
        Ok(totals)
    }
}

/// Optional inclusive issue-date window for a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ValueObject for StatementPeriod {}

impl StatementPeriod {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Read-only financial snapshot for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStatement {
    pub student_id: StudentId,
    pub student_name: String,
    pub rows: Vec<StatementRow>,
    pub totals: StatementTotals,
}

/// Read-only financial snapshot for one school, aggregated over its active
/// students. Per-invoice rows are optional; totals are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolStatement {
    pub school_id: SchoolId,
    pub school_name: String,
    pub student_count: u64,
    pub totals: StatementTotals,
    pub rows: Option<Vec<StatementRow>>,
}
