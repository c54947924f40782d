//! Redis-backed statement cache (feature `redis`).
//!
//! Decorates any [`BillingStore`] with a cache over the two statement
//! queries. Invalidation is a coarse epoch counter: every billing write
//! bumps it, which orphans every previously written key; orphans age out
//! through the TTL. Any Redis failure degrades to the inner store, so the
//! cache is never load-bearing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use redis::Commands;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use campusbill_auth::User;
use campusbill_billing::{Invoice, InvoiceItem, Payment, StatementPeriod, StatementRow};
use campusbill_core::{InvoiceId, SchoolId, StudentId, UserId};
use campusbill_directory::{School, Student};

use super::traits::{BillingStore, Page, PaymentAppend, StoreError, UserStore};

const EPOCH_KEY: &str = "campusbill:statements:epoch";
const DEFAULT_TTL_SECS: u64 = 300;

/// Statement-caching decorator over a [`BillingStore`].
pub struct CachedBillingStore<S> {
    inner: S,
    client: redis::Client,
    ttl_secs: u64,
}

impl<S> CachedBillingStore<S> {
    pub fn new(inner: S, redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("redis client: {e}")))?;
        Ok(Self {
            inner,
            client,
            ttl_secs: DEFAULT_TTL_SECS,
        })
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Current epoch, or `None` when Redis cannot answer (callers then skip
    /// the cache entirely for that request).
    fn epoch(&self) -> Option<i64> {
        let mut conn = self.client.get_connection().ok()?;
        conn.get::<_, Option<i64>>(EPOCH_KEY).ok()?.or(Some(0))
    }

    /// Orphan every cached statement. Best effort; a failed bump only costs
    /// a warning because reads fall back to the inner store on stale-epoch
    /// misses anyway once the TTL clears them.
    fn bump_epoch(&self) {
        let Ok(mut conn) = self.client.get_connection() else {
            warn!("statement cache invalidation skipped: redis unreachable");
            return;
        };
        if let Err(e) = conn.incr::<_, _, i64>(EPOCH_KEY, 1) {
            warn!(error = %e, "statement cache invalidation failed");
        }
    }

    fn fetch_cached(&self, key: &str) -> Option<Vec<StatementRow>> {
        let mut conn = self.client.get_connection().ok()?;
        let payload: Option<String> = conn.get(key).ok()?;
        serde_json::from_str(&payload?).ok()
    }

    fn store_cached(&self, key: &str, rows: &[StatementRow]) {
        let Ok(payload) = serde_json::to_string(rows) else {
            return;
        };
        let Ok(mut conn) = self.client.get_connection() else {
            return;
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, payload, self.ttl_secs) {
            debug!(error = %e, "statement cache write failed");
        }
    }
}

fn period_key(period: StatementPeriod) -> String {
    let part = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    format!("{}:{}", part(period.start), part(period.end))
}

#[async_trait]
impl<S: BillingStore> BillingStore for CachedBillingStore<S> {
    async fn insert_school(&self, school: &School) -> Result<(), StoreError> {
        self.inner.insert_school(school).await?;
        self.bump_epoch();
        Ok(())
    }

    async fn get_school(&self, id: SchoolId) -> Result<Option<School>, StoreError> {
        self.inner.get_school(id).await
    }

    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        self.inner.list_schools().await
    }

    async fn update_school(&self, school: &School) -> Result<bool, StoreError> {
        let updated = self.inner.update_school(school).await?;
        if updated {
            self.bump_epoch();
        }
        Ok(updated)
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        self.inner.insert_student(student).await?;
        self.bump_epoch();
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        self.inner.get_student(id).await
    }

    async fn list_students(
        &self,
        school_id: SchoolId,
        page: Page,
    ) -> Result<Vec<Student>, StoreError> {
        self.inner.list_students(school_id, page).await
    }

    async fn count_students(&self, school_id: SchoolId) -> Result<u64, StoreError> {
        self.inner.count_students(school_id).await
    }

    async fn update_student(&self, student: &Student) -> Result<bool, StoreError> {
        let updated = self.inner.update_student(student).await?;
        if updated {
            self.bump_epoch();
        }
        Ok(updated)
    }

    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> Result<(), StoreError> {
        self.inner.insert_invoice(invoice, items).await?;
        self.bump_epoch();
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.inner.get_invoice(id).await
    }

    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, StoreError> {
        self.inner.list_invoices(student_id).await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let updated = self.inner.update_invoice(invoice).await?;
        if updated {
            self.bump_epoch();
        }
        Ok(updated)
    }

    async fn list_invoice_items(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<InvoiceItem>, StoreError> {
        self.inner.list_invoice_items(invoice_id).await
    }

    async fn insert_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let total = self.inner.insert_invoice_item(item).await?;
        if total.is_some() {
            self.bump_epoch();
        }
        Ok(total)
    }

    async fn update_invoice_item(&self, item: &InvoiceItem) -> Result<Option<Decimal>, StoreError> {
        let total = self.inner.update_invoice_item(item).await?;
        if total.is_some() {
            self.bump_epoch();
        }
        Ok(total)
    }

    async fn list_payments(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        self.inner.list_payments(invoice_id).await
    }

    async fn append_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentAppend, StoreError> {
        let outcome = self
            .inner
            .append_payment(invoice_id, amount, paid_date, now)
            .await?;
        if matches!(outcome, PaymentAppend::Recorded { .. }) {
            self.bump_epoch();
        }
        Ok(outcome)
    }

    async fn student_statement_rows(
        &self,
        student_id: StudentId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let key = self
            .epoch()
            .map(|epoch| format!("campusbill:statements:{epoch}:student:{student_id}:{}", period_key(period)));
        if let Some(key) = &key {
            if let Some(rows) = self.fetch_cached(key) {
                return Ok(rows);
            }
        }
        let rows = self.inner.student_statement_rows(student_id, period).await?;
        if let Some(key) = &key {
            self.store_cached(key, &rows);
        }
        Ok(rows)
    }

    async fn school_statement_rows(
        &self,
        school_id: SchoolId,
        period: StatementPeriod,
    ) -> Result<Vec<StatementRow>, StoreError> {
        let key = self
            .epoch()
            .map(|epoch| format!("campusbill:statements:{epoch}:school:{school_id}:{}", period_key(period)));
        if let Some(key) = &key {
            if let Some(rows) = self.fetch_cached(key) {
                return Ok(rows);
            }
        }
        let rows = self.inner.school_statement_rows(school_id, period).await?;
        if let Some(key) = &key {
            self.store_cached(key, &rows);
        }
        Ok(rows)
    }
}

#[async_trait]
impl<S: UserStore> UserStore for CachedBillingStore<S> {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.get_user(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.get_user_by_email(email).await
    }
}
