//! Payment recording and listing.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use campusbill_billing::{InvoiceBalance, Payment, validate_amount};
use campusbill_core::InvoiceId;

use crate::store::{BillingStore, PaymentAppend};

use super::BillingError;

/// A recorded payment together with the invoice's fresh balance.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub balance: InvoiceBalance,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn BillingStore>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Record a payment against an active invoice.
    ///
    /// The amount gate runs before any store call; the overpayment check and
    /// the insert are atomic inside the store. Cancelled and soft-deleted
    /// invoices both read as not found here.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, amount = %amount), err)]
    pub async fn record(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        paid_date: NaiveDate,
    ) -> Result<PaymentReceipt, BillingError> {
        validate_amount(amount)?;
        match self
            .store
            .append_payment(invoice_id, amount, paid_date, Utc::now())
            .await?
        {
            PaymentAppend::Recorded { payment, balance } => {
                Ok(PaymentReceipt { payment, balance })
            }
            PaymentAppend::InvoiceNotFound => Err(BillingError::NotFound),
            PaymentAppend::Overpaid { remaining } => Err(BillingError::Overpayment { remaining }),
        }
    }

    /// Payments of an invoice. Cancelled invoices keep their payment history
    /// visible; only soft-deleted invoices read as not found.
    #[instrument(skip(self), fields(invoice_id = %invoice_id), err)]
    pub async fn list(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, BillingError> {
        if self.store.get_invoice(invoice_id).await?.is_none() {
            return Err(BillingError::NotFound);
        }
        Ok(self.store.list_payments(invoice_id).await?)
    }
}
