use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use noah_booking::{Booking, BookingStatus, CreateBooking, PaymentState, UpdateBooking};
use noah_core::identity::Claims;
use noah_core::page::Page;
use noah_core::validate::{Checker, FieldError, Validate};

use crate::error::AppError;
use crate::middleware::auth::{caller_id, require_staff};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking).put(update_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/payment-status", post(set_payment_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub amenity_id: Uuid,
    pub package_id: Uuid,
    pub apartment_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl Validate for CreateBookingRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require("amenity_id", !self.amenity_id.is_nil(), "amenity_id is required");
        check.require("package_id", !self.package_id.is_nil(), "package_id is required");
        check.require(
            "notes",
            self.notes.as_deref().map_or(true, |n| n.len() <= 1000),
            "notes must be at most 1000 characters",
        );
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingRequest {
    pub package_id: Uuid,
    pub notes: Option<String>,
}

impl Validate for UpdateBookingRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require("package_id", !self.package_id.is_nil(), "package_id is required");
        check.require(
            "notes",
            self.notes.as_deref().map_or(true, |n| n.len() <= 1000),
            "notes must be at most 1000 characters",
        );
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPaymentStatusRequest {
    pub payment_status: PaymentState,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub amenity_id: Uuid,
    pub package_id: Uuid,
    pub apartment_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub payment_status: PaymentState,
    pub total_price_vnd: i64,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    /// Residents may only withdraw bookings that are still pending.
    pub can_cancel: bool,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        let can_cancel = b.status == BookingStatus::Pending;
        Self {
            booking_id: b.booking_id,
            amenity_id: b.amenity_id,
            package_id: b.package_id,
            apartment_id: b.apartment_id,
            user_id: b.user_id,
            start_date: b.start_date,
            end_date: b.end_date,
            status: b.status,
            payment_status: b.payment_status,
            total_price_vnd: b.total_price_vnd,
            notes: b.notes,
            cancel_reason: b.cancel_reason,
            can_cancel,
        }
    }
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    req.validate()?;
    let user_id = caller_id(&claims)?;

    let apartment_id = req.apartment_id.or(claims.apartment_id);
    let booking = state
        .lifecycle
        .create_booking(
            user_id,
            CreateBooking {
                amenity_id: req.amenity_id,
                package_id: req.package_id,
                apartment_id,
                notes: req.notes,
            },
        )
        .await?;

    state.metrics.bookings_created.inc();
    Ok(Json(booking.into()))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.lifecycle.get(booking_id).await?;
    if !claims.is_staff() && Some(booking.user_id) != claims.user_id() {
        return Err(AppError::AuthorizationError(
            "Bookings are only visible to their owner".to_string(),
        ));
    }
    Ok(Json(booking.into()))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let user_id = caller_id(&claims)?;
    let bookings = state.lifecycle.list_for_user(user_id, page).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

async fn update_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    req.validate()?;
    let booking = state.lifecycle.get(booking_id).await?;
    if !claims.is_staff() && Some(booking.user_id) != claims.user_id() {
        return Err(AppError::AuthorizationError(
            "Only the booking owner can change it".to_string(),
        ));
    }

    let updated = state
        .lifecycle
        .update_booking(
            booking_id,
            UpdateBooking {
                package_id: req.package_id,
                notes: req.notes,
            },
        )
        .await?;
    Ok(Json(updated.into()))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    require_staff(&claims)?;
    let booking = state.lifecycle.confirm_booking(booking_id).await?;
    Ok(Json(booking.into()))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.lifecycle.get(booking_id).await?;
    if !claims.is_staff() && Some(booking.user_id) != claims.user_id() {
        return Err(AppError::AuthorizationError(
            "Only the booking owner or staff can cancel it".to_string(),
        ));
    }

    let reason = req.reason.as_deref().unwrap_or("cancelled by user");
    let cancelled = state.lifecycle.cancel_booking(booking_id, reason).await?;
    Ok(Json(cancelled.into()))
}

async fn set_payment_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<SetPaymentStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    require_staff(&claims)?;
    let booking = state
        .lifecycle
        .update_payment_status(booking_id, req.payment_status)
        .await?;
    Ok(Json(booking.into()))
}
