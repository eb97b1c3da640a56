use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use noah_booking::BookingError;
use noah_core::validate::FieldError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError {
        message: String,
        fields: Vec<FieldError>,
    },
    NotFoundError(String),
    ConflictError(String),
    GatewayError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg }))
            }
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::ValidationError { message, fields } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "fields": fields }),
            ),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::GatewayError(msg) => {
                tracing::error!("Payment gateway failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Payment provider is unavailable, please retry" }),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<Vec<FieldError>> for AppError {
    fn from(fields: Vec<FieldError>) -> Self {
        AppError::ValidationError {
            message: "Validation failed".to_string(),
            fields,
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(id) => AppError::NotFoundError(format!("Booking {id} not found")),
            BookingError::Validation(msg) => AppError::validation(msg),
            BookingError::InvalidTransition { .. } | BookingError::Overlap { .. } => {
                AppError::ConflictError(err.to_string())
            }
            BookingError::DateRange => AppError::validation(err.to_string()),
            BookingError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<noah_billing::BillingError> for AppError {
    fn from(err: noah_billing::BillingError) -> Self {
        use noah_billing::BillingError;
        match err {
            BillingError::InvoiceNotFound(id) => {
                AppError::NotFoundError(format!("Invoice {id} not found"))
            }
            BillingError::ReceiptNotFound(id) => {
                AppError::NotFoundError(format!("Receipt {id} not found"))
            }
            BillingError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<noah_payment::PaymentError> for AppError {
    fn from(err: noah_payment::PaymentError) -> Self {
        use noah_payment::PaymentError;
        match err {
            PaymentError::UnknownOrder(code) => {
                AppError::NotFoundError(format!("Unknown order code {code}"))
            }
            PaymentError::Gateway(inner) => AppError::GatewayError(inner.to_string()),
        }
    }
}

impl From<noah_core::BoxError> for AppError {
    fn from(err: noah_core::BoxError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
