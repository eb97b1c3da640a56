use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use noah_booking::{Booking, BookingRepository, BookingStatus, PaymentState};
use noah_core::page::Page;
use noah_core::RepoResult;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    booking_id: Uuid,
    amenity_id: Uuid,
    package_id: Uuid,
    apartment_id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    payment_status: String,
    total_price_vnd: i64,
    notes: Option<String>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, noah_core::BoxError> {
        Ok(Booking {
            booking_id: self.booking_id,
            amenity_id: self.amenity_id,
            package_id: self.package_id,
            apartment_id: self.apartment_id,
            user_id: self.user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status.parse::<BookingStatus>()?,
            payment_status: self.payment_status.parse::<PaymentState>()?,
            total_price_vnd: self.total_price_vnd,
            notes: self.notes,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "booking_id, amenity_id, package_id, apartment_id, user_id, \
     start_date, end_date, status, payment_status, total_price_vnd, notes, cancel_reason, \
     created_at, updated_at";

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(&self, booking: &Booking) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO amenity_bookings
                (booking_id, amenity_id, package_id, apartment_id, user_id,
                 start_date, end_date, status, payment_status, total_price_vnd,
                 notes, cancel_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(booking.booking_id)
        .bind(booking.amenity_id)
        .bind(booking.package_id)
        .bind(booking.apartment_id)
        .bind(booking.user_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.total_price_vnd)
        .bind(&booking.notes)
        .bind(&booking.cancel_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM amenity_bookings WHERE booking_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn update(&self, booking: &Booking) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE amenity_bookings
            SET package_id = $2, end_date = $3, status = $4, payment_status = $5,
                total_price_vnd = $6, notes = $7, cancel_reason = $8, updated_at = $9
            WHERE booking_id = $1
            "#,
        )
        .bind(booking.booking_id)
        .bind(booking.package_id)
        .bind(booking.end_date)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.total_price_vnd)
        .bind(&booking.notes)
        .bind(&booking.cancel_reason)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("booking {} does not exist", booking.booking_id).into());
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid, page: Page) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM amenity_bookings WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_overlapping(
        &self,
        amenity_id: Uuid,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM amenity_bookings \
             WHERE amenity_id = $1 AND user_id = $2 \
               AND status NOT IN ('CANCELLED', 'REJECTED') \
               AND start_date <= $4 AND end_date >= $3"
        ))
        .bind(amenity_id)
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM amenity_bookings WHERE status = $1"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM amenity_bookings \
             WHERE status = 'PENDING' AND payment_status = 'UNPAID' AND created_at < $1"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}
