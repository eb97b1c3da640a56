use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmenityStatus {
    Active,
    Inactive,
    /// The underlying asset is being serviced; new bookings are rejected
    /// until maintenance finishes.
    Maintenance,
}

impl AmenityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmenityStatus::Active => "ACTIVE",
            AmenityStatus::Inactive => "INACTIVE",
            AmenityStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::str::FromStr for AmenityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AmenityStatus::Active),
            "INACTIVE" => Ok(AmenityStatus::Inactive),
            "MAINTENANCE" => Ok(AmenityStatus::Maintenance),
            other => Err(format!("unknown amenity status: {other}")),
        }
    }
}

/// A bookable facility (gym, pool, ...) offering one or more packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amenity {
    pub amenity_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub status: AmenityStatus,
}

impl Amenity {
    pub fn new(name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            amenity_id: Uuid::new_v4(),
            name: name.into(),
            location,
            status: AmenityStatus::Active,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.status == AmenityStatus::Active
    }
}
