pub mod lifecycle;
pub mod models;
pub mod repository;

pub use lifecycle::{BookingClock, BookingError, BookingLifecycle, CreateBooking, UpdateBooking};
pub use models::{Booking, BookingStatus, PaymentState};
pub use repository::{BookingRepository, MemoryBookingRepository};
