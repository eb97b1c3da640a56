use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use noah_catalog::{AmenityPackage, AmenityRepository, AmenityStatus};
use noah_core::residence::ApartmentRepository;

use crate::models::{Booking, BookingStatus, PaymentState};
use crate::repository::BookingRepository;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("An active booking for this amenity already runs {start} to {end}")]
    Overlap { start: NaiveDate, end: NaiveDate },

    #[error("Date range overflows the calendar")]
    DateRange,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    fn storage(err: noah_core::BoxError) -> Self {
        BookingError::Storage(err.to_string())
    }
}

/// Source of "today" for date-range computation. Production applies the
/// building's wall-clock offset (Vietnam, UTC+7); tests pin an exact date.
#[derive(Debug, Clone, Copy)]
pub enum BookingClock {
    UtcOffsetHours(i64),
    Fixed(NaiveDate),
}

impl BookingClock {
    pub fn today(&self) -> NaiveDate {
        match self {
            BookingClock::UtcOffsetHours(hours) => {
                (Utc::now() + Duration::hours(*hours)).date_naive()
            }
            BookingClock::Fixed(date) => *date,
        }
    }
}

impl Default for BookingClock {
    fn default() -> Self {
        BookingClock::UtcOffsetHours(7)
    }
}

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub amenity_id: Uuid,
    pub package_id: Uuid,
    /// Resolved from the caller's primary residence when omitted.
    pub apartment_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateBooking {
    pub package_id: Uuid,
    pub notes: Option<String>,
}

/// Booking lifecycle service: date computation from package terms, overlap
/// validation, and guarded status transitions.
pub struct BookingLifecycle {
    bookings: Arc<dyn BookingRepository>,
    amenities: Arc<dyn AmenityRepository>,
    apartments: Arc<dyn ApartmentRepository>,
    clock: BookingClock,
}

impl BookingLifecycle {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        amenities: Arc<dyn AmenityRepository>,
        apartments: Arc<dyn ApartmentRepository>,
        clock: BookingClock,
    ) -> Self {
        Self {
            bookings,
            amenities,
            apartments,
            clock,
        }
    }

    /// The service's notion of "today", shared with the sweep worker.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get(booking_id)
            .await
            .map_err(BookingError::storage)?
            .ok_or(BookingError::NotFound(booking_id))
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: noah_core::page::Page,
    ) -> Result<Vec<Booking>, BookingError> {
        self.bookings
            .list_by_user(user_id, page)
            .await
            .map_err(BookingError::storage)
    }

    pub async fn create_booking(
        &self,
        user_id: Uuid,
        req: CreateBooking,
    ) -> Result<Booking, BookingError> {
        let amenity = self
            .amenities
            .get_amenity(req.amenity_id)
            .await
            .map_err(BookingError::storage)?
            .ok_or_else(|| BookingError::Validation("Amenity not found".into()))?;

        match amenity.status {
            AmenityStatus::Active => {}
            AmenityStatus::Maintenance => {
                return Err(BookingError::Validation(format!(
                    "{} is under maintenance and cannot be booked right now",
                    amenity.name
                )))
            }
            AmenityStatus::Inactive => {
                return Err(BookingError::Validation(
                    "Amenity is not available for booking".into(),
                ))
            }
        }

        let package = self.resolve_package(req.package_id, req.amenity_id).await?;

        let apartment_id = match req.apartment_id {
            Some(id) => id,
            None => self
                .apartments
                .primary_apartment_of(user_id)
                .await
                .map_err(BookingError::storage)?
                .map(|a| a.apartment_id)
                .ok_or_else(|| {
                    BookingError::Validation("Caller has no registered apartment".into())
                })?,
        };

        let start_date = self.clock.today();
        let end_date = package
            .term
            .end_date(start_date)
            .ok_or(BookingError::DateRange)?;

        let overlapping = self
            .bookings
            .list_overlapping(req.amenity_id, user_id, start_date, end_date)
            .await
            .map_err(BookingError::storage)?;
        if let Some(conflict) = overlapping.first() {
            return Err(BookingError::Overlap {
                start: conflict.start_date,
                end: conflict.end_date,
            });
        }

        let now = Utc::now();
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            amenity_id: req.amenity_id,
            package_id: req.package_id,
            apartment_id,
            user_id,
            start_date,
            end_date,
            status: BookingStatus::Pending,
            payment_status: PaymentState::Unpaid,
            total_price_vnd: package.price_vnd,
            notes: req.notes,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.bookings
            .create(&booking)
            .await
            .map_err(BookingError::storage)?;
        info!(booking_id = %booking.booking_id, amenity = %amenity.name, "booking created");
        Ok(booking)
    }

    /// Package change, only while Pending. The start date is kept and the end
    /// date recomputed from the new term.
    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        req: UpdateBooking,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.get(booking_id).await?;

        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status.as_str(),
                to: "PENDING",
            });
        }

        let package = self.resolve_package(req.package_id, booking.amenity_id).await?;

        booking.package_id = package.package_id;
        booking.end_date = package
            .term
            .end_date(booking.start_date)
            .ok_or(BookingError::DateRange)?;
        booking.total_price_vnd = package.price_vnd;
        booking.notes = req.notes;
        booking.updated_at = Utc::now();

        self.bookings
            .update(&booking)
            .await
            .map_err(BookingError::storage)?;
        Ok(booking)
    }

    pub async fn confirm_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self.get(booking_id).await?;

        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status.as_str(),
                to: BookingStatus::Confirmed.as_str(),
            });
        }

        booking.update_status(BookingStatus::Confirmed);
        self.bookings
            .update(&booking)
            .await
            .map_err(BookingError::storage)?;
        info!(booking_id = %booking_id, "booking confirmed");
        Ok(booking)
    }

    pub async fn complete_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let mut booking = self.get(booking_id).await?;

        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from: booking.status.as_str(),
                to: BookingStatus::Completed.as_str(),
            });
        }

        booking.update_status(BookingStatus::Completed);
        self.bookings
            .update(&booking)
            .await
            .map_err(BookingError::storage)?;
        Ok(booking)
    }

    /// Cancels any non-terminal booking, recording the reason. Idempotent:
    /// cancelling an already-cancelled booking succeeds without touching it
    /// again.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.get(booking_id).await?;

        match booking.status {
            BookingStatus::Cancelled => return Ok(booking),
            BookingStatus::Completed | BookingStatus::Rejected => {
                return Err(BookingError::InvalidTransition {
                    from: booking.status.as_str(),
                    to: BookingStatus::Cancelled.as_str(),
                })
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        booking.cancel_reason = Some(reason.to_string());
        booking.update_status(BookingStatus::Cancelled);
        self.bookings
            .update(&booking)
            .await
            .map_err(BookingError::storage)?;
        info!(booking_id = %booking_id, reason, "booking cancelled");
        Ok(booking)
    }

    /// Direct payment-state update. No gateway proof is validated here; the
    /// payment watcher is the component that supplies trust.
    pub async fn update_payment_status(
        &self,
        booking_id: Uuid,
        state: PaymentState,
    ) -> Result<Booking, BookingError> {
        let mut booking = self.get(booking_id).await?;
        booking.update_payment(state);
        self.bookings
            .update(&booking)
            .await
            .map_err(BookingError::storage)?;

        if state == PaymentState::Paid && booking.status == BookingStatus::Confirmed {
            info!(booking_id = %booking_id, "booking paid and confirmed");
        }
        Ok(booking)
    }

    /// Sweep: Confirmed bookings whose service window has elapsed move to
    /// Completed. Returns the number updated.
    pub async fn complete_expired(&self, today: NaiveDate) -> Result<usize, BookingError> {
        let confirmed = self
            .bookings
            .list_by_status(BookingStatus::Confirmed)
            .await
            .map_err(BookingError::storage)?;

        let mut updated = 0;
        for booking in confirmed {
            if booking.end_date <= today {
                match self.complete_booking(booking.booking_id).await {
                    Ok(_) => updated += 1,
                    Err(err) => {
                        warn!(booking_id = %booking.booking_id, %err, "failed to complete elapsed booking")
                    }
                }
            }
        }
        Ok(updated)
    }

    /// Sweep: Pending/Unpaid bookings older than the cutoff are cancelled
    /// with reason "timeout". Server-side backstop for abandoned payment
    /// attempts.
    pub async fn cancel_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, BookingError> {
        let stale = self
            .bookings
            .list_stale_pending(cutoff)
            .await
            .map_err(BookingError::storage)?;

        let mut cancelled = 0;
        for booking in stale {
            match self.cancel_booking(booking.booking_id, "timeout").await {
                Ok(_) => cancelled += 1,
                Err(err) => {
                    warn!(booking_id = %booking.booking_id, %err, "failed to cancel stale booking")
                }
            }
        }
        Ok(cancelled)
    }

    async fn resolve_package(
        &self,
        package_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<AmenityPackage, BookingError> {
        let package = self
            .amenities
            .get_package(package_id)
            .await
            .map_err(BookingError::storage)?
            .ok_or_else(|| BookingError::Validation("Package not found".into()))?;

        if package.amenity_id != amenity_id {
            return Err(BookingError::Validation(
                "Package does not belong to the specified amenity".into(),
            ));
        }
        if !package.is_active() {
            return Err(BookingError::Validation("Package is not available".into()));
        }
        Ok(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryBookingRepository;
    use noah_catalog::{Amenity, AmenityRepository, MemoryAmenityRepository, PackageTerm};
    use noah_core::residence::{Apartment, MemoryApartmentDirectory};

    struct Fixture {
        lifecycle: BookingLifecycle,
        amenity_id: Uuid,
        month_package: Uuid,
        day_package: Uuid,
        user_id: Uuid,
        apartment_id: Uuid,
    }

    async fn fixture(today: NaiveDate) -> Fixture {
        let bookings = Arc::new(MemoryBookingRepository::new());
        let amenities = Arc::new(MemoryAmenityRepository::new());
        let apartments = Arc::new(MemoryApartmentDirectory::new());

        let amenity = Amenity::new("Swimming Pool", Some("Tower A, Level 3".into()));
        let amenity_id = amenity.amenity_id;
        amenities.create_amenity(&amenity).await.unwrap();

        let month = noah_catalog::AmenityPackage::new(
            amenity_id,
            "1 month pass",
            300_000,
            PackageTerm::Months(1),
        );
        let day = noah_catalog::AmenityPackage::new(
            amenity_id,
            "3 day pass",
            50_000,
            PackageTerm::Days(3),
        );
        let month_package = month.package_id;
        let day_package = day.package_id;
        amenities.create_package(&month).await.unwrap();
        amenities.create_package(&day).await.unwrap();

        let user_id = Uuid::new_v4();
        let apartment = Apartment {
            apartment_id: Uuid::new_v4(),
            code: "A-1203".into(),
            floor: Some(12),
        };
        let apartment_id = apartment.apartment_id;
        apartments.insert(apartment);
        apartments.register_resident(user_id, apartment_id);

        Fixture {
            lifecycle: BookingLifecycle::new(
                bookings,
                amenities,
                apartments,
                BookingClock::Fixed(today),
            ),
            amenity_id,
            month_package,
            day_package,
            user_id,
            apartment_id,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn one_month_booking_gets_derived_dates_and_initial_statuses() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(booking.start_date, date(2024, 6, 1));
        assert_eq!(booking.end_date, date(2024, 7, 1));
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentState::Unpaid);
        assert_eq!(booking.total_price_vnd, 300_000);
        assert_eq!(booking.apartment_id, fx.apartment_id);
    }

    #[tokio::test]
    async fn day_package_end_date_counts_days() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.day_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(booking.end_date, date(2024, 6, 4));
    }

    #[tokio::test]
    async fn rejects_unknown_amenity_and_foreign_package() {
        let fx = fixture(date(2024, 6, 1)).await;

        let err = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: Uuid::new_v4(),
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_overlapping_booking_for_same_amenity() {
        let fx = fixture(date(2024, 6, 1)).await;
        let req = CreateBooking {
            amenity_id: fx.amenity_id,
            package_id: fx.month_package,
            apartment_id: None,
            notes: None,
        };
        fx.lifecycle
            .create_booking(fx.user_id, req.clone())
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .create_booking(fx.user_id, req)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Overlap { .. }));
    }

    #[tokio::test]
    async fn update_recomputes_end_date_from_original_start() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let updated = fx
            .lifecycle
            .update_booking(
                booking.booking_id,
                UpdateBooking {
                    package_id: fx.day_package,
                    notes: Some("switched to day pass".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.start_date, date(2024, 6, 1));
        assert_eq!(updated.end_date, date(2024, 6, 4));
        assert_eq!(updated.total_price_vnd, 50_000);
    }

    #[tokio::test]
    async fn update_fails_once_booking_left_pending() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        fx.lifecycle
            .confirm_booking(booking.booking_id)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .update_booking(
                booking.booking_id,
                UpdateBooking {
                    package_id: fx.day_package,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn confirm_requires_pending() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        fx.lifecycle
            .cancel_booking(booking.booking_id, "changed my mind")
            .await
            .unwrap();
        let err = fx
            .lifecycle
            .confirm_booking(booking.booking_id)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let first = fx
            .lifecycle
            .cancel_booking(booking.booking_id, "timeout")
            .await
            .unwrap();
        let second = fx
            .lifecycle
            .cancel_booking(booking.booking_id, "something else")
            .await
            .unwrap();

        assert_eq!(first.status, BookingStatus::Cancelled);
        assert_eq!(second.status, BookingStatus::Cancelled);
        // The original reason survives the second call.
        assert_eq!(second.cancel_reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn completed_booking_cannot_be_cancelled() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.day_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        fx.lifecycle
            .confirm_booking(booking.booking_id)
            .await
            .unwrap();
        fx.lifecycle
            .complete_booking(booking.booking_id)
            .await
            .unwrap();

        let err = fx
            .lifecycle
            .cancel_booking(booking.booking_id, "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn sweep_completes_elapsed_confirmed_bookings() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.day_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        fx.lifecycle
            .confirm_booking(booking.booking_id)
            .await
            .unwrap();

        // Window runs through 2024-06-04; a sweep the day before leaves it.
        assert_eq!(
            fx.lifecycle.complete_expired(date(2024, 6, 3)).await.unwrap(),
            0
        );
        assert_eq!(
            fx.lifecycle.complete_expired(date(2024, 6, 4)).await.unwrap(),
            1
        );
        let after = fx.lifecycle.get(booking.booking_id).await.unwrap();
        assert_eq!(after.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn sweep_cancels_stale_unpaid_bookings() {
        let fx = fixture(date(2024, 6, 1)).await;
        let booking = fx
            .lifecycle
            .create_booking(
                fx.user_id,
                CreateBooking {
                    amenity_id: fx.amenity_id,
                    package_id: fx.month_package,
                    apartment_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let cancelled = fx
            .lifecycle
            .cancel_stale(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(cancelled, 1);

        let after = fx.lifecycle.get(booking.booking_id).await.unwrap();
        assert_eq!(after.status, BookingStatus::Cancelled);
        assert_eq!(after.cancel_reason.as_deref(), Some("timeout"));
    }
}
