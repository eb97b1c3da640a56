use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{InvoiceStatus, Receipt};
use crate::repository::{InvoiceRepository, ReceiptRepository};

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(Uuid),

    #[error("Receipt not found: {0}")]
    ReceiptNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone)]
pub struct CreateReceipt {
    pub invoice_id: Uuid,
    pub amount_vnd: i64,
    pub payment_method_code: String,
    pub payment_date: DateTime<Utc>,
    pub note: Option<String>,
}

/// Receipt creation against invoices. The one idempotent write in the
/// system: an invoice that already has a receipt answers with the existing
/// receipt rather than an error, so a success handler that runs twice books
/// the funds exactly once.
pub struct ReceiptLedger {
    invoices: Arc<dyn InvoiceRepository>,
    receipts: Arc<dyn ReceiptRepository>,
}

impl ReceiptLedger {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, receipts: Arc<dyn ReceiptRepository>) -> Self {
        Self { invoices, receipts }
    }

    pub async fn get_receipt(&self, receipt_id: Uuid) -> Result<Receipt, BillingError> {
        self.receipts
            .get(receipt_id)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?
            .ok_or(BillingError::ReceiptNotFound(receipt_id))
    }

    /// Returns the receipt plus whether this call created it.
    pub async fn create_for_invoice(
        &self,
        req: CreateReceipt,
    ) -> Result<(Receipt, bool), BillingError> {
        let invoice = self
            .invoices
            .get(req.invoice_id)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?
            .ok_or(BillingError::InvoiceNotFound(req.invoice_id))?;

        if let Some(existing) = self
            .receipts
            .find_by_invoice(req.invoice_id)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?
        {
            warn!(
                invoice_id = %req.invoice_id,
                receipt_no = %existing.receipt_no,
                "invoice already has a receipt"
            );
            return Ok((existing, false));
        }

        let receipt_id = Uuid::new_v4();
        let receipt = Receipt {
            receipt_id,
            receipt_no: Receipt::number_for(receipt_id),
            invoice_id: invoice.invoice_id,
            amount_vnd: req.amount_vnd,
            payment_method_code: req.payment_method_code,
            payment_date: req.payment_date,
            note: req.note,
            created_at: Utc::now(),
        };

        self.receipts
            .create(&receipt)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?;
        self.invoices
            .set_status(invoice.invoice_id, InvoiceStatus::Paid)
            .await
            .map_err(|e| BillingError::Storage(e.to_string()))?;

        info!(
            invoice_id = %invoice.invoice_id,
            receipt_no = %receipt.receipt_no,
            "receipt created"
        );
        Ok((receipt, true))
    }
}
