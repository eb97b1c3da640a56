use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use noah_core::page::Page;
use noah_core::RepoResult;

use crate::{Amenity, AmenityPackage};

/// Catalog data access. Packages always hang off an amenity.
#[async_trait]
pub trait AmenityRepository: Send + Sync {
    async fn create_amenity(&self, amenity: &Amenity) -> RepoResult<()>;

    async fn get_amenity(&self, id: Uuid) -> RepoResult<Option<Amenity>>;

    async fn list_amenities(&self, page: Page) -> RepoResult<Vec<Amenity>>;

    async fn create_package(&self, package: &AmenityPackage) -> RepoResult<()>;

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<AmenityPackage>>;

    async fn list_packages(&self, amenity_id: Uuid) -> RepoResult<Vec<AmenityPackage>>;
}

/// In-process catalog used by service tests and local runs.
#[derive(Default)]
pub struct MemoryAmenityRepository {
    amenities: Mutex<HashMap<Uuid, Amenity>>,
    packages: Mutex<HashMap<Uuid, AmenityPackage>>,
}

impl MemoryAmenityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AmenityRepository for MemoryAmenityRepository {
    async fn create_amenity(&self, amenity: &Amenity) -> RepoResult<()> {
        self.amenities
            .lock()
            .expect("catalog poisoned")
            .insert(amenity.amenity_id, amenity.clone());
        Ok(())
    }

    async fn get_amenity(&self, id: Uuid) -> RepoResult<Option<Amenity>> {
        Ok(self
            .amenities
            .lock()
            .expect("catalog poisoned")
            .get(&id)
            .cloned())
    }

    async fn list_amenities(&self, page: Page) -> RepoResult<Vec<Amenity>> {
        let mut all: Vec<Amenity> = self
            .amenities
            .lock()
            .expect("catalog poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn create_package(&self, package: &AmenityPackage) -> RepoResult<()> {
        self.packages
            .lock()
            .expect("catalog poisoned")
            .insert(package.package_id, package.clone());
        Ok(())
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<AmenityPackage>> {
        Ok(self
            .packages
            .lock()
            .expect("catalog poisoned")
            .get(&id)
            .cloned())
    }

    async fn list_packages(&self, amenity_id: Uuid) -> RepoResult<Vec<AmenityPackage>> {
        let mut matching: Vec<AmenityPackage> = self
            .packages
            .lock()
            .expect("catalog poisoned")
            .values()
            .filter(|p| p.amenity_id == amenity_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}
