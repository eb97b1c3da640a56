use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status over its lifecycle. Completed/Rejected are terminal;
/// Cancelled is terminal but re-cancelling is tolerated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Unpaid,
    Paid,
    Refunded,
    Overdue,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Unpaid => "UNPAID",
            PaymentState::Paid => "PAID",
            PaymentState::Refunded => "REFUNDED",
            PaymentState::Overdue => "OVERDUE",
        }
    }
}

impl std::str::FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentState::Unpaid),
            "PAID" => Ok(PaymentState::Paid),
            "REFUNDED" => Ok(PaymentState::Refunded),
            "OVERDUE" => Ok(PaymentState::Overdue),
            other => Err(format!("unknown payment state: {other}")),
        }
    }
}

/// A reservation of an amenity package by an apartment/resident for a date
/// range. `end_date` is always derived from the package term; callers never
/// set it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn update_status(&mut self, status: BookingStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn update_payment(&mut self, state: PaymentState) {
        self.payment_status = state;
        self.updated_at = Utc::now();
    }

    /// Whether the service window covers the given day.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}
