use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use campusbill_core::{
    DomainError, DomainResult, Entity, InvoiceId, InvoiceItemId, StudentId, money,
};

/// Invoice status lifecycle.
///
/// "Paid" is a derived balance fact, never a stored status; the only
/// transition is active → cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Active,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Active => "active",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InvoiceStatus::Active),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown invoice status: {other}"
            ))),
        }
    }
}

/// An invoice issued to a student. Owns its line items and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub student_id: StudentId,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Always equals the sum of active item amounts; recomputed on every
    /// item mutation, inside the same transaction as the item write.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn new(
        student_id: StudentId,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            student_id,
            status: InvoiceStatus::Active,
            issue_date,
            due_date,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Sum of active (non-deleted) item amounts, checked.
    pub fn items_total(items: &[InvoiceItem]) -> DomainResult<Decimal> {
        money::checked_money_sum(
            items
                .iter()
                .filter(|item| item.deleted_at.is_none())
                .map(|item| item.amount),
            "invoice total",
        )
    }

    pub fn recalculate_total(
        &mut self,
        items: &[InvoiceItem],
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.total = Self::items_total(items)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(DomainError::conflict("invoice is already cancelled"));
        }
        self.status = InvoiceStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::conflict("invoice is already deleted"));
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == InvoiceStatus::Cancelled
    }

    /// Invariant helper: payments land only on active, non-deleted invoices.
    /// A fully paid invoice still "accepts" payments here; the overpayment
    /// gate is what rejects them, with the remaining capacity.
    pub fn accepts_payments(&self) -> bool {
        self.status == InvoiceStatus::Active && self.deleted_at.is_none()
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &InvoiceId {
        &self.id
    }
}

/// A line item on an invoice: a purely additive breakdown of the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// `quantity × unit_price`, checked at construction.
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl InvoiceItem {
    pub fn new(
        invoice_id: InvoiceId,
        description: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let description = normalized_description(description.into())?;
        let amount = item_amount(quantity, unit_price)?;
        Ok(Self {
            id: InvoiceItemId::new(),
            invoice_id,
            description,
            quantity,
            unit_price,
            amount,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Apply a partial update; `None` keeps the existing value. The amount is
    /// recomputed from whatever quantity/unit price result.
    pub fn update(
        &mut self,
        description: Option<String>,
        quantity: Option<i32>,
        unit_price: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(description) = description {
            self.description = normalized_description(description)?;
        }
        let quantity = quantity.unwrap_or(self.quantity);
        let unit_price = unit_price.unwrap_or(self.unit_price);
        self.amount = item_amount(quantity, unit_price)?;
        self.quantity = quantity;
        self.unit_price = unit_price;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.deleted_at.is_some() {
            return Err(DomainError::conflict("invoice item is already deleted"));
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for InvoiceItem {
    type Id = InvoiceItemId;

    fn id(&self) -> &InvoiceItemId {
        &self.id
    }
}

fn normalized_description(description: String) -> DomainResult<String> {
    let description = description.trim().to_string();
    if description.is_empty() {
        return Err(DomainError::validation("item description cannot be empty"));
    }
    Ok(description)
}

fn item_amount(quantity: i32, unit_price: Decimal) -> DomainResult<Decimal> {
    if quantity <= 0 {
        return Err(DomainError::validation("item quantity must be positive"));
    }
    money::ensure_non_negative_money(unit_price, "item unit price")?;
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| DomainError::invariant("item amount overflowed"))
}
