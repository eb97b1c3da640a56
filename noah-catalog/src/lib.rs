pub mod amenity;
pub mod package;
pub mod repository;

pub use amenity::{Amenity, AmenityStatus};
pub use package::{AmenityPackage, PackageStatus, PackageTerm};
pub use repository::{AmenityRepository, MemoryAmenityRepository};
