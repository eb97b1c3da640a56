pub mod models;
pub mod receipts;
pub mod repository;

pub use models::{Invoice, InvoiceStatus, Receipt};
pub use receipts::{BillingError, CreateReceipt, ReceiptLedger};
pub use repository::{
    InvoiceRepository, MemoryInvoiceRepository, MemoryReceiptRepository, ReceiptRepository,
};
