use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use campusbill_core::{DomainResult, Entity, InvoiceId, PaymentId, money};

/// A single partial or full payment applied against one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub paid_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_amount(amount)?;
        Ok(Self {
            id: PaymentId::new(),
            invoice_id,
            amount,
            paid_date,
            created_at: now,
            deleted_at: None,
        })
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &PaymentId {
        &self.id
    }
}

/// Amount gate applied before any write: positive, at most 2 decimal places.
pub fn validate_amount(amount: Decimal) -> DomainResult<()> {
    money::ensure_positive_money(amount, "payment amount")
}
