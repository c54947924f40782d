//! In-memory billing store.
//!
//! Intended for tests and development. Not optimized for performance: lists
//! and sums scan whole tables. Writers serialize behind `RwLock`s, which is
//! what makes the payment append atomic here (the Postgres store uses row
//! locks instead). Lock order is schools, students, invoices, items,
//! payments; every method acquires in that order.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use campusbill_auth::User;
use campusbill_billing::{
    Invoice, InvoiceItem, Payment, StatementPeriod, StatementRow, balance_for, check_payment_fits,
    sort_rows,
};
use campusbill_core::{
    DomainError, InvoiceId, InvoiceItemId, PaymentId, SchoolId, StudentId, UserId, money,
};
use campusbill_directory::{School, Student};

use super::traits::{BillingStore, Page, PaymentAppend, StoreError, UserStore};

/// Thread-safe in-memory implementation of [`BillingStore`] and
/// [`UserStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    schools: RwLock<HashMap<SchoolId, School>>,
    students: RwLock<HashMap<StudentId, Student>>,
    invoices: RwLock<HashMap<InvoiceId, Invoice>>,
    items: RwLock<HashMap<InvoiceItemId, InvoiceItem>>,
    payments: RwLock<HashMap<PaymentId, Payment>>,
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// Total of an invoice's active items, via the domain's checked sum.
fn active_items_total(
    items: &HashMap<InvoiceItemId, InvoiceItem>,
    invoice_id: InvoiceId,
) -> Result<Decimal, StoreError> {
    let of_invoice: Vec<InvoiceItem> = items
        .values()
        .filter(|item| item.invoice_id == invoice_id)
        .cloned()
        .collect();
    Invoice::items_total(&of_invoice).map_err(|e| StoreError::Query(format!("invoice total: {e}")))
}

/// Build one statement row for an invoice from the active payments table.
fn statement_row(
    invoice: &Invoice,
    payments: &HashMap<PaymentId, Payment>,
) -> Result<StatementRow, StoreError> {
    let paid = money::checked_money_sum(
        payments
            .values()
            .filter(|p| p.invoice_id == invoice.id && p.deleted_at.is_none())
            .map(|p| p.amount),
        "paid total",
    )
    .map_err(|e| StoreError::Query(format!("paid total: {e}")))?;

    Ok(StatementRow {
        invoice_id: invoice.id,
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        status: invoice.status,
        balance: balance_for(invoice.status, invoice.total, paid),
    })
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn insert_school(&self, school: &School) -> Result<(), StoreError> {
        let mut schools = self.schools.write().map_err(|_| lock_poisoned())?;
        schools.insert(school.id, school.clone());
        Ok(())
    }

    async fn get_school(&self, id: SchoolId) -> Result<Option<School>, StoreError> {
        let schools = self.schools.read().map_err(|_| lock_poisoned())?;
        Ok(schools.get(&id).filter(|s| s.deleted_at.is_none()).cloned())
    }

    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        let schools = self.schools.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<School> = schools
            .values()
            .filter(|s| s.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn update_school(&self, school: &School) -> Result<bool, StoreError> {
        let mut schools = self.schools.write().map_err(|_| lock_poisoned())?;
        match schools.get_mut(&school.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = school.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut students = self.students.write().map_err(|_| lock_poisoned())?;
        students.insert(student.id, student.clone());
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let students = self.students.read().map_err(|_| lock_poisoned())?;
        Ok(students.get(&id).filter(|s| s.deleted_at.is_none()).cloned())
    }

    async fn list_students(
        &self,
        school_id: SchoolId,
        page: Page,
    ) -> Result<Vec<Student>, StoreError> {
        let students = self.students.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<Student> = students
            .values()
            .filter(|s| s.school_id == school_id && s.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_students(&self, school_id: SchoolId) -> Result<u64, StoreError> {
        let students = self.students.read().map_err(|_| lock_poisoned())?;
        Ok(students
            .values()
            .filter(|s| s.school_id == school_id && s.deleted_at.is_none())
            .count() as u64)
    }

    async fn update_student(&self, student: &Student) -> Result<bool, StoreError> {
        let mut students = self.students.write().map_err(|_| lock_poisoned())?;
        match students.get_mut(&student.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = student.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> Result<(), StoreError> {
        let mut invoices = self.invoices.write().map_err(|_| lock_poisoned())?;
        let mut stored_items = self.items.write().map_err(|_| lock_poisoned())?;
        invoices.insert(invoice.id, invoice.clone());
        for item in items {
            stored_items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let invoices = self.invoices.read().map_err(|_| lock_poisoned())?;
        Ok(invoices.get(&id).filter(|i| i.deleted_at.is_none()).cloned())
    }

    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, StoreError> {
        let invoices = self.invoices.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<Invoice> = invoices
            .values()
            .filter(|i| i.student_id == student_id && i.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.issue_date.cmp(&b.issue_date).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let mut invoices = self.invoices.write().map_err(|_| lock_poisoned())?;
        match invoices.get_mut(&invoice.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = invoice.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_invoice_items(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, StoreError> {
        let items = self.items.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<InvoiceItem> = items
            .values()
            .filter(|i| i.invoice_id == invoice_id && i.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn insert_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let mut invoices = self.invoices.write().map_err(|_| lock_poisoned())?;
        let mut items = self.items.write().map_err(|_| lock_poisoned())?;
        let Some(invoice) = invoices
            .get_mut(&item.invoice_id)
            .filter(|i| i.deleted_at.is_none())
        else {
            return Ok(None);
        };

        items.insert(item.id, item.clone());
        let total = active_items_total(&items, item.invoice_id)?;
        invoice.total = total;
        invoice.updated_at = item.updated_at;
        Ok(Some(total))
    }

    async fn update_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let mut invoices = self.invoices.write().map_err(|_| lock_poisoned())?;
        let mut items = self.items.write().map_err(|_| lock_poisoned())?;
        let Some(invoice) = invoices
            .get_mut(&item.invoice_id)
            .filter(|i| i.deleted_at.is_none())
        else {
            return Ok(None);
        };

        match items.get_mut(&item.id) {
            Some(existing)
                if existing.invoice_id == item.invoice_id && existing.deleted_at.is_none() =>
            {
                *existing = item.clone();
            }
            _ => return Ok(None),
        }

        let total = active_items_total(&items, item.invoice_id)?;
        invoice.total = total;
        invoice.updated_at = item.updated_at;
        Ok(Some(total))
    }

    async fn list_payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        let payments = self.payments.read().map_err(|_| lock_poisoned())?;
        let mut out: Vec<Payment> = payments
            .values()
            .filter(|p| p.invoice_id == invoice_id && p.deleted_at.is_none())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.paid_date.cmp(&b.paid_date).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn append_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentAppend, StoreError> {
        let invoices = self.invoices.read().map_err(|_| lock_poisoned())?;
        // Holding the payments write lock across sum, check, and insert
        // serializes concurrent appends against the same invoice.
        let mut payments = self.payments.write().map_err(|_| lock_poisoned())?;

        let Some(invoice) = invoices.get(&invoice_id).filter(|i| i.accepts_payments()) else {
            return Ok(PaymentAppend::InvoiceNotFound);
        };

        let paid = money::checked_money_sum(
            payments
                .values()
                .filter(|p| p.invoice_id == invoice_id && p.deleted_at.is_none())
                .map(|p| p.amount),
            "paid total",
        )
        .map_err(|e| StoreError::Query(format!("paid total: {e}")))?;

        if let Err(err) = check_payment_fits(invoice.total, paid, amount) {
            return match err {
                DomainError::Overpayment { remaining } => {
                    Ok(PaymentAppend::Overpaid { remaining })
                }
                other => Err(StoreError::Query(format!("payment gate: {other}"))),
            };
        }

        let payment = Payment {
            id: PaymentId::new(),
            invoice_id,
            amount,
            paid_date,
            created_at: now,
            deleted_at: None,
        };
        payments.insert(payment.id, payment.clone());

        let balance = balance_for(invoice.status, invoice.total, paid + amount);
        Ok(PaymentAppend::Recorded { payment, balance })
    }

    async fn student_statement_rows(
        &self,
        student_id: StudentId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let invoices = self.invoices.read().map_err(|_| lock_poisoned())?;
        let payments = self.payments.read().map_err(|_| lock_poisoned())?;

        let mut rows = Vec::new();
        for invoice in invoices.values() {
            if invoice.student_id != student_id
                || invoice.deleted_at.is_some()
                || !period.contains(invoice.issue_date)
            {
                continue;
            }
            rows.push(statement_row(invoice, &payments)?);
        }
        sort_rows(&mut rows);
        Ok(rows)
    }

    async fn school_statement_rows(
        &self,
        school_id: SchoolId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let students = self.students.read().map_err(|_| lock_poisoned())?;
        let invoices = self.invoices.read().map_err(|_| lock_poisoned())?;
        let payments = self.payments.read().map_err(|_| lock_poisoned())?;

        let active_students: HashSet<StudentId> = students
            .values()
            .filter(|s| s.school_id == school_id && s.deleted_at.is_none())
            .map(|s| s.id)
            .collect();

        let mut rows = Vec::new();
        for invoice in invoices.values() {
            if !active_students.contains(&invoice.student_id)
                || invoice.deleted_at.is_some()
                || !period.contains(invoice.issue_date)
            {
                continue;
            }
            rows.push(statement_row(invoice, &payments)?);
        }
        sort_rows(&mut rows);
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| lock_poisoned())?;
        // Mirrors the unique index on users.email in the Postgres schema.
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "duplicate email: {}",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        Ok(users.get(&id).filter(|u| u.deleted_at.is_none()).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        Ok(users
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }
}
