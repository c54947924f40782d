//! Invoice and line-item management.
//!
//! Item rules enforced here: an invoice is created with at least one item,
//! keeps at least one active item for its whole life, and recomputes its
//! total inside the same transaction as any item change. Cancelled invoices
//! reject item mutations with a conflict.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use campusbill_billing::{Invoice, InvoiceBalance, InvoiceItem, balance_for};
use campusbill_core::{InvoiceId, InvoiceItemId, StudentId, money};

use crate::store::BillingStore;

use super::BillingError;

/// Line-item input for invoice creation and item addition.
#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// An invoice with its active items and computed balance.
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub balance: InvoiceBalance,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn BillingStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Issue an invoice to a student with its initial items.
    #[instrument(skip(self, items), fields(student_id = %student_id, item_count = items.len()), err)]
    pub async fn create(
        &self,
        student_id: StudentId,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
        items: Vec<NewInvoiceItem>,
    ) -> Result<InvoiceDetails, BillingError> {
        if self.store.get_student(student_id).await?.is_none() {
            return Err(BillingError::NotFound);
        }
        if items.is_empty() {
            return Err(BillingError::Validation(
                "invoice requires at least one item".to_string(),
            ));
        }

        let now = Utc::now();
        let mut invoice = Invoice::new(student_id, issue_date, due_date, now);
        let items = items
            .into_iter()
            .map(|input| {
                InvoiceItem::new(
                    invoice.id,
                    input.description,
                    input.quantity,
                    input.unit_price,
                    now,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        invoice.recalculate_total(&items, now)?;

        self.store.insert_invoice(&invoice, &items).await?;

        let balance = balance_for(invoice.status, invoice.total, Decimal::ZERO);
        Ok(InvoiceDetails {
            invoice,
            items,
            balance,
        })
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn get(&self, id: InvoiceId) -> Result<InvoiceDetails, BillingError> {
        let invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or(BillingError::NotFound)?;
        let items = self.store.list_invoice_items(id).await?;
        let paid = money::checked_money_sum(
            self.store.list_payments(id).await?.iter().map(|p| p.amount),
            "paid total",
        )?;
        let balance = balance_for(invoice.status, invoice.total, paid);
        Ok(InvoiceDetails {
            invoice,
            items,
            balance,
        })
    }

    #[instrument(skip(self), fields(student_id = %student_id), err)]
    pub async fn list_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Invoice>, BillingError> {
        if self.store.get_student(student_id).await?.is_none() {
            return Err(BillingError::NotFound);
        }
        Ok(self.store.list_invoices(student_id).await?)
    }

    /// Cancel an invoice. Its payments stay on record and its pending
    /// balance reads as zero from here on; cancelling twice is a conflict.
    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn cancel(&self, id: InvoiceId) -> Result<InvoiceDetails, BillingError> {
        let mut invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or(BillingError::NotFound)?;
        invoice.cancel(Utc::now())?;
        if !self.store.update_invoice(&invoice).await? {
            return Err(BillingError::NotFound);
        }

        let items = self.store.list_invoice_items(id).await?;
        let paid = money::checked_money_sum(
            self.store.list_payments(id).await?.iter().map(|p| p.amount),
            "paid total",
        )?;
        let balance = balance_for(invoice.status, invoice.total, paid);
        Ok(InvoiceDetails {
            invoice,
            items,
            balance,
        })
    }

    #[instrument(skip(self), fields(id = %id), err)]
    pub async fn delete(&self, id: InvoiceId) -> Result<(), BillingError> {
        let mut invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or(BillingError::NotFound)?;
        invoice.mark_deleted(Utc::now())?;
        if !self.store.update_invoice(&invoice).await? {
            return Err(BillingError::NotFound);
        }
        Ok(())
    }

    /// Add an item to an active invoice. Returns the item and the invoice's
    /// recomputed total.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id), err)]
    pub async fn add_item(
        &self,
        invoice_id: InvoiceId,
        input: NewInvoiceItem,
    ) -> Result<(InvoiceItem, Decimal), BillingError> {
        self.active_invoice(invoice_id).await?;
        let item = InvoiceItem::new(
            invoice_id,
            input.description,
            input.quantity,
            input.unit_price,
            Utc::now(),
        )?;
        match self.store.insert_invoice_item(&item).await? {
            Some(total) => Ok((item, total)),
            None => Err(BillingError::NotFound),
        }
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id, item_id = %item_id), err)]
    pub async fn update_item(
        &self,
        invoice_id: InvoiceId,
        item_id: InvoiceItemId,
        description: Option<String>,
        quantity: Option<i32>,
        unit_price: Option<Decimal>,
    ) -> Result<(InvoiceItem, Decimal), BillingError> {
        self.active_invoice(invoice_id).await?;
        let items = self.store.list_invoice_items(invoice_id).await?;
        let mut item = items
            .into_iter()
            .find(|i| i.id == item_id)
            .ok_or(BillingError::NotFound)?;
        item.update(description, quantity, unit_price, Utc::now())?;
        match self.store.update_invoice_item(&item).await? {
            Some(total) => Ok((item, total)),
            None => Err(BillingError::NotFound),
        }
    }

    /// Soft-remove an item. The last active item of an invoice cannot be
    /// removed. Returns the invoice's recomputed total.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, item_id = %item_id), err)]
    pub async fn remove_item(
        &self,
        invoice_id: InvoiceId,
        item_id: InvoiceItemId,
    ) -> Result<Decimal, BillingError> {
        self.active_invoice(invoice_id).await?;
        let items = self.store.list_invoice_items(invoice_id).await?;
        let mut item = items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or(BillingError::NotFound)?;
        if items.len() == 1 {
            return Err(BillingError::Validation(
                "invoice must retain at least one item".to_string(),
            ));
        }
        item.mark_deleted(Utc::now())?;
        match self.store.update_invoice_item(&item).await? {
            Some(total) => Ok(total),
            None => Err(BillingError::NotFound),
        }
    }

    /// Lookup that also rejects cancelled invoices, for item mutation paths.
    async fn active_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or(BillingError::NotFound)?;
        if invoice.is_cancelled() {
            return Err(BillingError::Conflict("invoice is cancelled".to_string()));
        }
        Ok(invoice)
    }
}
