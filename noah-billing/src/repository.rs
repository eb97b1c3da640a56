use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use noah_core::RepoResult;

use crate::models::{Invoice, InvoiceStatus, Receipt};

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn create(&self, invoice: &Invoice) -> RepoResult<()>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Invoice>>;

    async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> RepoResult<()>;
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    async fn create(&self, receipt: &Receipt) -> RepoResult<()>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Receipt>>;

    async fn find_by_invoice(&self, invoice_id: Uuid) -> RepoResult<Option<Receipt>>;
}

#[derive(Default)]
pub struct MemoryInvoiceRepository {
    invoices: Mutex<HashMap<Uuid, Invoice>>,
}

impl MemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceRepository for MemoryInvoiceRepository {
    async fn create(&self, invoice: &Invoice) -> RepoResult<()> {
        self.invoices
            .lock()
            .expect("invoice store poisoned")
            .insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        Ok(self
            .invoices
            .lock()
            .expect("invoice store poisoned")
            .get(&id)
            .cloned())
    }

    async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> RepoResult<()> {
        let mut invoices = self.invoices.lock().expect("invoice store poisoned");
        let invoice = invoices
            .get_mut(&id)
            .ok_or_else(|| format!("invoice {id} does not exist"))?;
        invoice.status = status;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryReceiptRepository {
    receipts: Mutex<HashMap<Uuid, Receipt>>,
}

impl MemoryReceiptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptRepository for MemoryReceiptRepository {
    async fn create(&self, receipt: &Receipt) -> RepoResult<()> {
        let mut receipts = self.receipts.lock().expect("receipt store poisoned");
        if receipts
            .values()
            .any(|r| r.invoice_id == receipt.invoice_id)
        {
            return Err(format!(
                "invoice {} already has a receipt",
                receipt.invoice_id
            )
            .into());
        }
        receipts.insert(receipt.receipt_id, receipt.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Receipt>> {
        Ok(self
            .receipts
            .lock()
            .expect("receipt store poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_by_invoice(&self, invoice_id: Uuid) -> RepoResult<Option<Receipt>> {
        Ok(self
            .receipts
            .lock()
            .expect("receipt store poisoned")
            .values()
            .find(|r| r.invoice_id == invoice_id)
            .cloned())
    }
}
