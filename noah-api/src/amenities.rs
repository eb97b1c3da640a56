use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use noah_catalog::{Amenity, AmenityPackage, AmenityRepository, PackageTerm};
use noah_core::identity::Claims;
use noah_core::page::Page;
use noah_core::validate::{Checker, FieldError, Validate};

use crate::error::AppError;
use crate::middleware::auth::require_staff;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/amenities", get(list_amenities).post(create_amenity))
        .route(
            "/v1/amenities/{id}/packages",
            get(list_packages).post(create_package),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateAmenityRequest {
    pub name: String,
    pub location: Option<String>,
}

impl Validate for CreateAmenityRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require("name", !self.name.trim().is_empty(), "name is required");
        check.require("name", self.name.len() <= 255, "name must be at most 255 characters");
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub name: String,
    pub price_vnd: i64,
    pub term: PackageTerm,
}

impl Validate for CreatePackageRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut check = Checker::new();
        check.require("name", !self.name.trim().is_empty(), "name is required");
        check.require("price_vnd", self.price_vnd > 0, "price_vnd must be positive");
        let count = match self.term {
            PackageTerm::Days(n) | PackageTerm::Months(n) => n,
        };
        check.require("term", count > 0, "term count must be positive");
        check.finish()
    }
}

async fn list_amenities(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Amenity>>, AppError> {
    let amenities = state.amenities.list_amenities(page).await?;
    Ok(Json(amenities))
}

async fn create_amenity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAmenityRequest>,
) -> Result<Json<Amenity>, AppError> {
    require_staff(&claims)?;
    req.validate()?;

    let amenity = Amenity::new(req.name, req.location);
    state.amenities.create_amenity(&amenity).await?;
    Ok(Json(amenity))
}

async fn list_packages(
    State(state): State<AppState>,
    Path(amenity_id): Path<Uuid>,
) -> Result<Json<Vec<AmenityPackage>>, AppError> {
    if state.amenities.get_amenity(amenity_id).await?.is_none() {
        return Err(AppError::NotFoundError(format!(
            "Amenity {amenity_id} not found"
        )));
    }
    let packages = state.amenities.list_packages(amenity_id).await?;
    Ok(Json(packages))
}

async fn create_package(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(amenity_id): Path<Uuid>,
    Json(req): Json<CreatePackageRequest>,
) -> Result<Json<AmenityPackage>, AppError> {
    require_staff(&claims)?;
    req.validate()?;

    if state.amenities.get_amenity(amenity_id).await?.is_none() {
        return Err(AppError::NotFoundError(format!(
            "Amenity {amenity_id} not found"
        )));
    }

    let package = AmenityPackage::new(amenity_id, req.name, req.price_vnd, req.term);
    state.amenities.create_package(&package).await?;
    Ok(Json(package))
}
