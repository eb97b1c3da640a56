use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use noah_billing::{CreateReceipt, Invoice, InvoiceRepository, Receipt};
use noah_core::identity::Claims;
use noah_core::validate::{Checker, FieldError, Validate};

use crate::error::AppError;
use crate::middleware::auth::require_staff;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/invoices", post(create_invoice))
        .route("/v1/invoices/{id}", get(get_invoice))
        .route("/v1/invoices/{id}/receipt", post(create_receipt))
        .route("/v1/receipts/{id}", get(get_receipt))
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub apartment_id: Uuid,
    pub amount_vnd: i64,
    pub description: String,
}

impl Validate for CreateInvoiceRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require(
            "apartment_id",
            !self.apartment_id.is_nil(),
            "apartment_id is required",
        );
        check.require("amount_vnd", self.amount_vnd > 0, "amount_vnd must be positive");
        check.require(
            "description",
            !self.description.trim().is_empty(),
            "description is required",
        );
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReceiptRequest {
    pub amount_vnd: i64,
    pub payment_method_code: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Validate for CreateReceiptRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require("amount_vnd", self.amount_vnd > 0, "amount_vnd must be positive");
        check.require(
            "payment_method_code",
            !self.payment_method_code.trim().is_empty(),
            "payment_method_code is required",
        );
        check.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub receipt: Receipt,
    /// False when the invoice already had a receipt and that one was
    /// returned instead.
    pub created: bool,
}

async fn create_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    require_staff(&claims)?;
    req.validate()?;

    let invoice = Invoice::new(req.apartment_id, req.amount_vnd, req.description);
    state.invoices.create(&invoice).await?;
    Ok(Json(invoice))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .invoices
        .get(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Invoice {invoice_id} not found")))?;
    Ok(Json(invoice))
}

/// Idempotent: posting a receipt against an invoice that already has one
/// returns the existing receipt with `created: false`.
async fn create_receipt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<CreateReceiptRequest>,
) -> Result<Json<ReceiptResponse>, AppError> {
    require_staff(&claims)?;
    req.validate()?;

    let (receipt, created) = state
        .receipts
        .create_for_invoice(CreateReceipt {
            invoice_id,
            amount_vnd: req.amount_vnd,
            payment_method_code: req.payment_method_code,
            payment_date: req.payment_date.unwrap_or_else(Utc::now),
            note: req.note,
        })
        .await?;
    Ok(Json(ReceiptResponse { receipt, created }))
}

async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state.receipts.get_receipt(receipt_id).await?;
    Ok(Json(receipt))
}
