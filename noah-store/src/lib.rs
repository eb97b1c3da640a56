pub mod app_config;
pub mod billing_repo;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod residence_repo;

pub use app_config::Config;
pub use billing_repo::{PgInvoiceRepository, PgReceiptRepository};
pub use booking_repo::PgBookingRepository;
pub use catalog_repo::PgAmenityRepository;
pub use database::DbClient;
pub use residence_repo::PgApartmentRepository;
