use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use noah_billing::InvoiceRepository;
use noah_booking::BookingStatus;
use noah_core::identity::Claims;
use noah_core::validate::{Checker, FieldError, Validate};
use noah_payment::{PaymentItem, PaymentSession, PaymentTarget, SessionState};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments", post(create_payment))
        .route("/v1/payments/{order_code}/status", get(payment_status))
        .route("/v1/payments/{order_code}/cancel", post(cancel_payment))
}

/// The amount is never client-supplied: booking payments charge the
/// booking's stored price and invoice payments charge the invoice.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<PaymentItem>,
}

impl Validate for CreatePaymentRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require(
            "booking_id",
            self.booking_id.is_some() || self.invoice_id.is_some(),
            "either booking_id or invoice_id is required",
        );
        check.require(
            "description",
            self.description.as_deref().map_or(true, |d| d.len() <= 255),
            "description must be at most 255 characters",
        );
        check.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentSessionResponse {
    pub order_code: String,
    pub qr_url: String,
    pub checkout_url: Option<String>,
    pub amount_vnd: i64,
    pub state: SessionState,
    pub expires_at: DateTime<Utc>,
}

impl From<PaymentSession> for PaymentSessionResponse {
    fn from(s: PaymentSession) -> Self {
        Self {
            order_code: s.order_code,
            qr_url: s.qr_url,
            checkout_url: s.checkout_url,
            amount_vnd: s.amount_vnd,
            state: s.state,
            expires_at: s.expires_at,
        }
    }
}

/// Creates the QR payment session and starts the server-side watcher that
/// owns this attempt. Booking confirmation is driven entirely by the
/// watcher; the status endpoint below never mutates anything.
async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentSessionResponse>, AppError> {
    req.validate()?;

    let mut amount = 0;
    let mut description = req.description.clone().unwrap_or_default();

    if let Some(booking_id) = req.booking_id {
        let booking = state.lifecycle.get(booking_id).await?;
        if !claims.is_staff() && Some(booking.user_id) != claims.user_id() {
            return Err(AppError::AuthorizationError(
                "Only the booking owner can pay for it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(AppError::ConflictError(format!(
                "Only pending bookings can be paid, current status is {}",
                booking.status.as_str()
            )));
        }

        amount = booking.total_price_vnd;
        if description.is_empty() {
            description = format!("Amenity booking {}", booking.booking_id.simple());
        }

        // One live attempt per booking: a newer QR replaces the older one
        // without touching the booking itself.
        if let Some(previous) = state
            .orchestrator
            .sessions()
            .active_for_booking(booking_id)
        {
            state.watchers.supersede(&previous.order_code);
        }
    }

    if let Some(invoice_id) = req.invoice_id {
        let invoice = state
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFoundError(format!("Invoice {invoice_id} not found")))?;
        if req.booking_id.is_none() {
            amount = invoice.amount_vnd;
            if description.is_empty() {
                description = invoice.description.clone();
            }
        }
    }

    let target = PaymentTarget {
        booking_id: req.booking_id,
        invoice_id: req.invoice_id,
    };
    let session = state
        .orchestrator
        .create_session(target, amount, description, req.items)
        .await?;

    let handle = state
        .watcher
        .clone()
        .spawn(session.clone(), state.watcher_config);
    let (cancel, task) = handle.into_parts();
    state
        .watchers
        .insert(session.order_code.clone(), cancel);

    let metrics = state.metrics.clone();
    let watchers = state.watchers.clone();
    let order_code = session.order_code.clone();
    tokio::spawn(async move {
        if let Ok(outcome) = task.await {
            metrics
                .payment_outcomes
                .with_label_values(&[outcome.as_str()])
                .inc();
        }
        watchers.remove(&order_code);
    });

    state.metrics.payment_sessions_created.inc();
    Ok(Json(session.into()))
}

/// Read-only reflection of the session; polling this endpoint never drives
/// state transitions.
async fn payment_status(
    State(state): State<AppState>,
    Path(order_code): Path<String>,
) -> Result<Json<PaymentSessionResponse>, AppError> {
    let session = state
        .orchestrator
        .sessions()
        .get(&order_code)
        .ok_or_else(|| AppError::NotFoundError(format!("Unknown order code {order_code}")))?;
    Ok(Json(session.into()))
}

async fn cancel_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_code): Path<String>,
) -> Result<Json<PaymentSessionResponse>, AppError> {
    let session = state
        .orchestrator
        .sessions()
        .get(&order_code)
        .ok_or_else(|| AppError::NotFoundError(format!("Unknown order code {order_code}")))?;

    if let Some(booking_id) = session.target.booking_id {
        let booking = state.lifecycle.get(booking_id).await?;
        if !claims.is_staff() && Some(booking.user_id) != claims.user_id() {
            return Err(AppError::AuthorizationError(
                "Only the booking owner can cancel this payment".to_string(),
            ));
        }
    }

    // The live watcher handles booking cleanup itself; when none survives
    // (it already finished, or the process restarted) fall back to a direct
    // cancel.
    if !state.watchers.cancel(&order_code) {
        state
            .orchestrator
            .cancel_session(&order_code, Some("user cancelled"))
            .await?;
        if let Some(booking_id) = session.target.booking_id {
            state
                .lifecycle
                .cancel_booking(booking_id, "user cancelled")
                .await?;
        }
    }

    let session = state
        .orchestrator
        .sessions()
        .get(&order_code)
        .ok_or_else(|| AppError::NotFoundError(format!("Unknown order code {order_code}")))?;
    Ok(Json(session.into()))
}
