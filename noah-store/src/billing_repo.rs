use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use noah_billing::{Invoice, InvoiceRepository, InvoiceStatus, Receipt, ReceiptRepository};
use noah_core::RepoResult;

pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    invoice_id: Uuid,
    apartment_id: Uuid,
    amount_vnd: i64,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_invoice(self) -> Result<Invoice, noah_core::BoxError> {
        Ok(Invoice {
            invoice_id: self.invoice_id,
            apartment_id: self.apartment_id,
            amount_vnd: self.amount_vnd,
            description: self.description,
            status: self.status.parse::<InvoiceStatus>()?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    async fn create(&self, invoice: &Invoice) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, apartment_id, amount_vnd, description, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(invoice.apartment_id)
        .bind(invoice.amount_vnd)
        .bind(&invoice.description)
        .bind(invoice.status.as_str())
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "SELECT invoice_id, apartment_id, amount_vnd, description, status, created_at \
             FROM invoices WHERE invoice_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(InvoiceRow::into_invoice).transpose()
    }

    async fn set_status(&self, id: Uuid, status: InvoiceStatus) -> RepoResult<()> {
        let result = sqlx::query("UPDATE invoices SET status = $1 WHERE invoice_id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(format!("invoice {id} does not exist").into());
        }
        Ok(())
    }
}

pub struct PgReceiptRepository {
    pool: PgPool,
}

impl PgReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    receipt_id: Uuid,
    receipt_no: String,
    invoice_id: Uuid,
    amount_vnd: i64,
    payment_method_code: String,
    payment_date: DateTime<Utc>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_receipt(self) -> Receipt {
        Receipt {
            receipt_id: self.receipt_id,
            receipt_no: self.receipt_no,
            invoice_id: self.invoice_id,
            amount_vnd: self.amount_vnd,
            payment_method_code: self.payment_method_code,
            payment_date: self.payment_date,
            note: self.note,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl ReceiptRepository for PgReceiptRepository {
    async fn create(&self, receipt: &Receipt) -> RepoResult<()> {
        // The unique index on invoice_id backs the one-receipt-per-invoice
        // rule; a race between two creators surfaces here as an error the
        // ledger resolves by re-reading.
        sqlx::query(
            r#"
            INSERT INTO receipts
                (receipt_id, receipt_no, invoice_id, amount_vnd, payment_method_code,
                 payment_date, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(receipt.receipt_id)
        .bind(&receipt.receipt_no)
        .bind(receipt.invoice_id)
        .bind(receipt.amount_vnd)
        .bind(&receipt.payment_method_code)
        .bind(receipt.payment_date)
        .bind(&receipt.note)
        .bind(receipt.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Receipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT receipt_id, receipt_no, invoice_id, amount_vnd, payment_method_code, \
             payment_date, note, created_at FROM receipts WHERE receipt_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ReceiptRow::into_receipt))
    }

    async fn find_by_invoice(&self, invoice_id: Uuid) -> RepoResult<Option<Receipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT receipt_id, receipt_no, invoice_id, amount_vnd, payment_method_code, \
             payment_date, note, created_at FROM receipts WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ReceiptRow::into_receipt))
    }
}
