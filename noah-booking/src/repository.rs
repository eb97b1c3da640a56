use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use noah_core::page::Page;
use noah_core::RepoResult;

use crate::models::{Booking, BookingStatus};

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &Booking) -> RepoResult<()>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn update(&self, booking: &Booking) -> RepoResult<()>;

    async fn list_by_user(&self, user_id: Uuid, page: Page) -> RepoResult<Vec<Booking>>;

    /// Non-cancelled bookings of the same user and amenity whose service
    /// window intersects `[start, end]`.
    async fn list_overlapping(
        &self,
        amenity_id: Uuid,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<Booking>>;

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>>;

    /// Pending, unpaid bookings created before the cutoff.
    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>>;
}

/// In-process booking store used by service tests and local runs.
#[derive(Default)]
pub struct MemoryBookingRepository {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn create(&self, booking: &Booking) -> RepoResult<()> {
        self.bookings
            .lock()
            .expect("booking store poisoned")
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self
            .bookings
            .lock()
            .expect("booking store poisoned")
            .get(&id)
            .cloned())
    }

    async fn update(&self, booking: &Booking) -> RepoResult<()> {
        let mut bookings = self.bookings.lock().expect("booking store poisoned");
        if !bookings.contains_key(&booking.booking_id) {
            return Err(format!("booking {} does not exist", booking.booking_id).into());
        }
        bookings.insert(booking.booking_id, booking.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid, page: Page) -> RepoResult<Vec<Booking>> {
        let mut mine: Vec<Booking> = self
            .bookings
            .lock()
            .expect("booking store poisoned")
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn list_overlapping(
        &self,
        amenity_id: Uuid,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepoResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .expect("booking store poisoned")
            .values()
            .filter(|b| {
                b.amenity_id == amenity_id
                    && b.user_id == user_id
                    && !matches!(
                        b.status,
                        BookingStatus::Cancelled | BookingStatus::Rejected
                    )
                    && b.start_date <= end
                    && start <= b.end_date
            })
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .expect("booking store poisoned")
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>> {
        Ok(self
            .bookings
            .lock()
            .expect("booking store poisoned")
            .values()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && b.payment_status == crate::models::PaymentState::Unpaid
                    && b.created_at < cutoff
            })
            .cloned()
            .collect())
    }
}
