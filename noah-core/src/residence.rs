use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::RepoResult;

/// An apartment unit. Bookings are always attributed to a unit, resolved from
/// the caller's primary residence when not passed explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apartment {
    pub apartment_id: Uuid,
    pub code: String,
    pub floor: Option<i32>,
}

#[async_trait]
pub trait ApartmentRepository: Send + Sync {
    async fn get_apartment(&self, id: Uuid) -> RepoResult<Option<Apartment>>;

    /// The unit a resident is registered to, if any.
    async fn primary_apartment_of(&self, user_id: Uuid) -> RepoResult<Option<Apartment>>;
}

/// In-process directory used by service tests and local runs.
#[derive(Default)]
pub struct MemoryApartmentDirectory {
    apartments: Mutex<HashMap<Uuid, Apartment>>,
    residents: Mutex<HashMap<Uuid, Uuid>>,
}

impl MemoryApartmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, apartment: Apartment) {
        self.apartments
            .lock()
            .expect("apartment directory poisoned")
            .insert(apartment.apartment_id, apartment);
    }

    pub fn register_resident(&self, user_id: Uuid, apartment_id: Uuid) {
        self.residents
            .lock()
            .expect("apartment directory poisoned")
            .insert(user_id, apartment_id);
    }
}

#[async_trait]
impl ApartmentRepository for MemoryApartmentDirectory {
    async fn get_apartment(&self, id: Uuid) -> RepoResult<Option<Apartment>> {
        Ok(self
            .apartments
            .lock()
            .expect("apartment directory poisoned")
            .get(&id)
            .cloned())
    }

    async fn primary_apartment_of(&self, user_id: Uuid) -> RepoResult<Option<Apartment>> {
        let apartment_id = {
            let residents = self
                .residents
                .lock()
                .expect("apartment directory poisoned");
            residents.get(&user_id).copied()
        };
        match apartment_id {
            Some(id) => self.get_apartment(id).await,
            None => Ok(None),
        }
    }
}
