//! Storage contracts for billing data and API users.
//!
//! Every read in these traits filters soft-deleted rows (`deleted_at IS NOT
//! NULL`) explicitly; nothing below the trait boundary resurrects a deleted
//! entity. Updates persist the full mutable state of an entity, including
//! `deleted_at`, so soft deletion is just another update.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use campusbill_auth::User;
use campusbill_billing::{
    Invoice, InvoiceBalance, InvoiceItem, Payment, StatementPeriod, StatementRow,
};
use campusbill_core::{InvoiceId, SchoolId, StudentId, UserId};
use campusbill_directory::{School, Student};

/// Storage backend failure.
///
/// These are infrastructure errors (connectivity, constraint violations,
/// undecodable rows), distinct from domain errors. The `Display` detail is
/// meant for logs; the HTTP layer never forwards it to clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or state conflict reported by the backend.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// The backend cannot be reached or cannot serve requests.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A query failed or returned rows that do not fit the domain model.
    #[error("query failed: {0}")]
    Query(String),
}

/// Limit and offset window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Largest window a single request may ask for.
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page, clamping the limit to [`Page::MAX_LIMIT`].
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.min(Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Outcome of an atomic payment append.
///
/// The overpayment check and the insert run inside one storage transaction
/// while the invoice row is held, so these variants are the only outcomes
/// the gate can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAppend {
    /// The payment was persisted; carries the invoice's fresh balance.
    Recorded {
        payment: Payment,
        balance: InvoiceBalance,
    },
    /// No active (non-deleted, non-cancelled) invoice with that id.
    InvoiceNotFound,
    /// The amount would push paid past total; nothing was written.
    Overpaid { remaining: Decimal },
}

/// Persistence for schools, students, invoices, items, payments, and the
/// statement queries built over them.
///
/// List orderings are part of the contract: invoices and statement rows come
/// back ordered by `issue_date` ascending with id as the tiebreaker, payments
/// by `paid_date` then id, everything else in creation (id) order.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_school(&self, school: &School) -> Result<(), StoreError>;

    /// Fetch an active school. Soft-deleted rows read as absent.
    async fn get_school(&self, id: SchoolId) -> Result<Option<School>, StoreError>;

    async fn list_schools(&self) -> Result<Vec<School>, StoreError>;

    /// Persist a school's mutable fields, `deleted_at` included. Returns
    /// `false` when no live row matched.
    async fn update_school(&self, school: &School) -> Result<bool, StoreError>;

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError>;

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;

    /// Active students of a school, one page at a time.
    async fn list_students(
        &self,
        school_id: SchoolId,
        page: Page,
    ) -> Result<Vec<Student>, StoreError>;

    async fn count_students(&self, school_id: SchoolId) -> Result<u64, StoreError>;

    async fn update_student(&self, student: &Student) -> Result<bool, StoreError>;

    /// Persist a new invoice together with its initial items, atomically.
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> Result<(), StoreError>;

    /// Fetch an invoice unless soft-deleted. Cancelled invoices are still
    /// returned; callers decide what cancellation means for them.
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, StoreError>;

    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError>;

    /// Active items of an invoice.
    async fn list_invoice_items(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, StoreError>;

    /// Insert an item and recompute the parent invoice's total in the same
    /// transaction. Returns the new total, or `None` when the parent invoice
    /// is missing or deleted.
    async fn insert_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError>;

    /// Persist an item's mutable fields (`deleted_at` included, so removal
    /// goes through here too) and recompute the parent total in the same
    /// transaction. Returns the new total, or `None` when no live item row
    /// matched under that invoice.
    async fn update_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError>;

    /// Active payments of an invoice, cancelled or not.
    async fn list_payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, StoreError>;

    /// Atomically gate and record a payment against an active invoice.
    ///
    /// Implementations must serialize concurrent appends against the same
    /// invoice (row lock or equivalent) so that the paid sum they check
    /// against cannot go stale between check and insert.
    async fn append_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentAppend, StoreError>;

    /// Per-invoice statement rows for one student, ordered by issue date
    /// (ascending, id tiebreak), restricted to the period when given.
    async fn student_statement_rows(
        &self,
        student_id: StudentId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError>;

    /// Statement rows across all active students of a school, computed as
    /// one grouped aggregation rather than a query per student.
    async fn school_statement_rows(
        &self,
        school_id: SchoolId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError>;
}

/// Persistence for API users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A duplicate email surfaces as
    /// [`StoreError::Conflict`].
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}
