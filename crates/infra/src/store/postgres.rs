//! Postgres-backed billing store.
//!
//! Soft deletion is a `deleted_at` timestamp and every query filters it
//! explicitly. Payment appends and item mutations run inside transactions
//! that lock the parent invoice row (`SELECT ... FOR UPDATE`), which closes
//! the read-check-insert race under concurrent requests.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |------------------------------|---------|---------------|
//! | `Database` (unique violation) | `23505` | `Conflict`    |
//! | `Database` (anything else)    | any     | `Query`       |
//! | `PoolClosed` / `PoolTimedOut` | n/a     | `Unavailable` |
//! | `Io`                          | n/a     | `Unavailable` |
//! | everything else               | n/a     | `Query`       |

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use campusbill_auth::{Role, User};
use campusbill_billing::{
    Invoice, InvoiceItem, InvoiceStatus, Payment, StatementPeriod, StatementRow, balance_for,
    check_payment_fits,
};
use campusbill_core::{
    DomainError, InvoiceId, InvoiceItemId, PaymentId, SchoolId, StudentId, UserId,
};
use campusbill_directory::{School, Student};

use super::traits::{BillingStore, Page, PaymentAppend, StoreError, UserStore};

/// Postgres implementation of [`BillingStore`] and [`UserStore`].
///
/// `Clone` is cheap: the connection pool is reference-counted, so one
/// connected store can serve both trait objects.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("connect failed: {e}")))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migrations failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are the caller's problem.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BillingStore for PostgresStore {
    #[instrument(skip(self, school), fields(school_id = %school.id), err)]
    async fn insert_school(&self, school: &School) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO schools (id, name, address, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(school.id.as_uuid())
        .bind(&school.name)
        .bind(&school.address)
        .bind(school.created_at)
        .bind(school.updated_at)
        .bind(school.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_school", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_school(&self, id: SchoolId) -> Result<Option<School>, StoreError> {
        let row: Option<SchoolRow> = sqlx::query_as(
            "SELECT id, name, address, created_at, updated_at, deleted_at
             FROM schools WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_school", e))?;
        Ok(row.map(School::from))
    }

    #[instrument(skip(self), err)]
    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        let rows: Vec<SchoolRow> = sqlx::query_as(
            "SELECT id, name, address, created_at, updated_at, deleted_at
             FROM schools WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_schools", e))?;
        Ok(rows.into_iter().map(School::from).collect())
    }

    #[instrument(skip(self, school), fields(school_id = %school.id), err)]
    async fn update_school(&self, school: &School) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE schools SET name = $2, address = $3, updated_at = $4, deleted_at = $5
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(school.id.as_uuid())
        .bind(&school.name)
        .bind(&school.address)
        .bind(school.updated_at)
        .bind(school.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_school", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, student), fields(student_id = %student.id), err)]
    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO students
                 (id, school_id, first_name, last_name, email, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(student.id.as_uuid())
        .bind(student.school_id.as_uuid())
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(student.created_at)
        .bind(student.updated_at)
        .bind(student.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_student", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let row: Option<StudentRow> = sqlx::query_as(
            "SELECT id, school_id, first_name, last_name, email, created_at, updated_at, deleted_at
             FROM students WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_student", e))?;
        Ok(row.map(Student::from))
    }

    #[instrument(skip(self), fields(school_id = %school_id), err)]
    async fn list_students(
        &self,
        school_id: SchoolId,
        page: Page,
    ) -> Result<Vec<Student>, StoreError> {
        let rows: Vec<StudentRow> = sqlx::query_as(
            "SELECT id, school_id, first_name, last_name, email, created_at, updated_at, deleted_at
             FROM students WHERE school_id = $1 AND deleted_at IS NULL
             ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(school_id.as_uuid())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_students", e))?;
        Ok(rows.into_iter().map(Student::from).collect())
    }

    #[instrument(skip(self), fields(school_id = %school_id), err)]
    async fn count_students(&self, school_id: SchoolId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM students WHERE school_id = $1 AND deleted_at IS NULL",
        )
        .bind(school_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_students", e))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, student), fields(student_id = %student.id), err)]
    async fn update_student(&self, student: &Student) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE students
             SET first_name = $2, last_name = $3, email = $4, updated_at = $5, deleted_at = $6
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(student.id.as_uuid())
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(student.updated_at)
        .bind(student.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_student", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, invoice, items), fields(invoice_id = %invoice.id, item_count = items.len()), err)]
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        sqlx::query(
            "INSERT INTO invoices
                 (id, student_id, status, issue_date, due_date, total,
                  created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.student_id.as_uuid())
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.total)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(invoice.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        for item in items {
            insert_item(&mut tx, item).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "SELECT id, student_id, status, issue_date, due_date, total,
                    created_at, updated_at, deleted_at
             FROM invoices WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_invoice", e))?;
        row.map(Invoice::try_from).transpose()
    }

    #[instrument(skip(self), fields(student_id = %student_id), err)]
    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, StoreError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            "SELECT id, student_id, status, issue_date, due_date, total,
                    created_at, updated_at, deleted_at
             FROM invoices WHERE student_id = $1 AND deleted_at IS NULL
             ORDER BY issue_date ASC, id ASC",
        )
        .bind(student_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id), err)]
    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE invoices
             SET status = $2, due_date = $3, total = $4, updated_at = $5, deleted_at = $6
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(invoice.total)
        .bind(invoice.updated_at)
        .bind(invoice.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_invoice", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id), err)]
    async fn list_invoice_items(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, StoreError> {
        let rows: Vec<InvoiceItemRow> = sqlx::query_as(
            "SELECT id, invoice_id, description, quantity, unit_price, amount,
                    created_at, updated_at, deleted_at
             FROM invoice_items WHERE invoice_id = $1 AND deleted_at IS NULL
             ORDER BY id",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoice_items", e))?;
        Ok(rows.into_iter().map(InvoiceItem::from).collect())
    }

    #[instrument(skip(self, item), fields(invoice_id = %item.invoice_id, item_id = %item.id), err)]
    async fn insert_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_item", e))?;

        if lock_invoice(&mut tx, item.invoice_id).await?.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("insert_invoice_item", e))?;
            return Ok(None);
        }

        insert_item(&mut tx, item).await?;
        let total = recompute_invoice_total(&mut tx, item.invoice_id, item.updated_at).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_item", e))?;
        Ok(Some(total))
    }

    #[instrument(skip(self, item), fields(invoice_id = %item.invoice_id, item_id = %item.id), err)]
    async fn update_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update_invoice_item", e))?;

        if lock_invoice(&mut tx, item.invoice_id).await?.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("update_invoice_item", e))?;
            return Ok(None);
        }

        let result = sqlx::query(
            "UPDATE invoice_items
             SET description = $3, quantity = $4, unit_price = $5, amount = $6,
                 updated_at = $7, deleted_at = $8
             WHERE id = $1 AND invoice_id = $2 AND deleted_at IS NULL",
        )
        .bind(item.id.as_uuid())
        .bind(item.invoice_id.as_uuid())
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .bind(item.updated_at)
        .bind(item.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_invoice_item", e))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("update_invoice_item", e))?;
            return Ok(None);
        }

        let total = recompute_invoice_total(&mut tx, item.invoice_id, item.updated_at).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_invoice_item", e))?;
        Ok(Some(total))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id), err)]
    async fn list_payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT id, invoice_id, amount, paid_date, created_at, deleted_at
             FROM payments WHERE invoice_id = $1 AND deleted_at IS NULL
             ORDER BY paid_date ASC, id ASC",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_payments", e))?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id, amount = %amount), err)]
    async fn append_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentAppend, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("append_payment", e))?;

        // Lock the invoice row so the paid sum below cannot go stale before
        // the insert commits.
        let total: Option<Decimal> = sqlx::query_scalar(
            "SELECT total FROM invoices
             WHERE id = $1 AND deleted_at IS NULL AND status = 'active'
             FOR UPDATE",
        )
        .bind(invoice_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_payment", e))?;

        let Some(total) = total else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("append_payment", e))?;
            return Ok(PaymentAppend::InvoiceNotFound);
        };

        let paid: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments
             WHERE invoice_id = $1 AND deleted_at IS NULL",
        )
        .bind(invoice_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_payment", e))?;

        if let Err(err) = check_payment_fits(total, paid, amount) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("append_payment", e))?;
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

        sqlx::query(
            "INSERT INTO payments (id, invoice_id, amount, paid_date, created_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.invoice_id.as_uuid())
        .bind(payment.amount)
        .bind(payment.paid_date)
        .bind(payment.created_at)
        .bind(payment.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_payment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("append_payment", e))?;

        let balance = balance_for(InvoiceStatus::Active, total, paid + amount);
        Ok(PaymentAppend::Recorded { payment, balance })
    }

    #[instrument(skip(self), fields(student_id = %student_id), err)]
    async fn student_statement_rows(
        &self,
        student_id: StudentId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let rows: Vec<StatementQueryRow> = sqlx::query_as(
            "SELECT i.id, i.issue_date, i.due_date, i.status, i.total,
                    COALESCE(p.paid, 0) AS paid
             FROM invoices i
             LEFT JOIN (
                 SELECT invoice_id, SUM(amount) AS paid
                 FROM payments
                 WHERE deleted_at IS NULL
                 GROUP BY invoice_id
             ) p ON p.invoice_id = i.id
             WHERE i.student_id = $1
               AND i.deleted_at IS NULL
               AND ($2::date IS NULL OR i.issue_date >= $2)
               AND ($3::date IS NULL OR i.issue_date <= $3)
             ORDER BY i.issue_date ASC, i.id ASC",
        )
        .bind(student_id.as_uuid())
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("student_statement_rows", e))?;
        rows.into_iter().map(StatementRow::try_from).collect()
    }

    #[instrument(skip(self), fields(school_id = %school_id), err)]
    async fn school_statement_rows(
        &self,
        school_id: SchoolId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let rows: Vec<StatementQueryRow> = sqlx::query_as(
            "SELECT i.id, i.issue_date, i.due_date, i.status, i.total,
                    COALESCE(p.paid, 0) AS paid
             FROM invoices i
             JOIN students s ON s.id = i.student_id AND s.deleted_at IS NULL
             LEFT JOIN (
                 SELECT invoice_id, SUM(amount) AS paid
                 FROM payments
                 WHERE deleted_at IS NULL
                 GROUP BY invoice_id
             ) p ON p.invoice_id = i.id
             WHERE s.school_id = $1
               AND i.deleted_at IS NULL
               AND ($2::date IS NULL OR i.issue_date >= $2)
               AND ($3::date IS NULL OR i.issue_date <= $3)
             ORDER BY i.issue_date ASC, i.id ASC",
        )
        .bind(school_id.as_uuid())
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("school_statement_rows", e))?;
        rows.into_iter().map(StatementRow::try_from).collect()
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();
        sqlx::query(
            "INSERT INTO users
                 (id, email, full_name, password_hash, roles, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, password_hash, roles, created_at, updated_at, deleted_at
             FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;
        Ok(row.map(User::from))
    }

    #[instrument(skip(self, email), err)]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, full_name, password_hash, roles, created_at, updated_at, deleted_at
             FROM users WHERE email = $1 AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user_by_email", e))?;
        Ok(row.map(User::from))
    }
}

/// Lock an active invoice row for the rest of the transaction.
async fn lock_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: InvoiceId,
) -> Result<Option<Uuid>, StoreError> {
    sqlx::query_scalar("SELECT id FROM invoices WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
        .bind(invoice_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_invoice", e))
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    item: &InvoiceItem,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO invoice_items
             (id, invoice_id, description, quantity, unit_price, amount,
              created_at, updated_at, deleted_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(item.id.as_uuid())
    .bind(item.invoice_id.as_uuid())
    .bind(&item.description)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.amount)
    .bind(item.created_at)
    .bind(item.updated_at)
    .bind(item.deleted_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_item", e))?;
    Ok(())
}

/// Recompute and persist an invoice's total from its active items. Runs in
/// the caller's transaction with the invoice row already locked.
async fn recompute_invoice_total(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: InvoiceId,
    now: DateTime<Utc>,
) -> Result<Decimal, StoreError> {
    let total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM invoice_items
         WHERE invoice_id = $1 AND deleted_at IS NULL",
    )
    .bind(invoice_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("recompute_invoice_total", e))?;

    sqlx::query("UPDATE invoices SET total = $2, updated_at = $3 WHERE id = $1")
        .bind(invoice_id.as_uuid())
        .bind(total)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("recompute_invoice_total", e))?;

    Ok(total)
}

/// Map SQLx errors onto [`StoreError`], tagged with the failing operation.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let detail = format!("database error in {operation}: {}", db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Conflict(detail)
            } else {
                StoreError::Query(detail)
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        other => StoreError::Query(format!("{operation} failed: {other}")),
    }
}

#[derive(sqlx::FromRow)]
struct SchoolRow {
    id: Uuid,
    name: String,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<SchoolRow> for School {
    fn from(row: SchoolRow) -> Self {
        School {
            id: SchoolId::from_uuid(row.id),
            name: row.name,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    school_id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: StudentId::from_uuid(row.id),
            school_id: SchoolId::from_uuid(row.school_id),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    student_id: Uuid,
    status: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::from_str(&row.status)
            .map_err(|e| StoreError::Query(format!("bad invoice row: {e}")))?;
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            student_id: StudentId::from_uuid(row.student_id),
            status,
            issue_date: row.issue_date,
            due_date: row.due_date,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceItemRow {
    id: Uuid,
    invoice_id: Uuid,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<InvoiceItemRow> for InvoiceItem {
    fn from(row: InvoiceItemRow) -> Self {
        InvoiceItem {
            id: InvoiceItemId::from_uuid(row.id),
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            amount: row.amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    invoice_id: Uuid,
    amount: Decimal,
    paid_date: NaiveDate,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: PaymentId::from_uuid(row.id),
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            amount: row.amount,
            paid_date: row.paid_date,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatementQueryRow {
    id: Uuid,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    status: String,
    total: Decimal,
    paid: Decimal,
}

impl TryFrom<StatementQueryRow> for StatementRow {
    type Error = StoreError;

    fn try_from(row: StatementQueryRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::from_str(&row.status)
            .map_err(|e| StoreError::Query(format!("bad statement row: {e}")))?;
        Ok(StatementRow {
            invoice_id: InvoiceId::from_uuid(row.id),
            issue_date: row.issue_date,
            due_date: row.due_date,
            status,
            balance: balance_for(status, row.total, row.paid),
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    password_hash: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            roles: row.roles.into_iter().map(Role::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}
