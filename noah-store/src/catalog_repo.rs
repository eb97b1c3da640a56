use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use noah_catalog::{
    Amenity, AmenityPackage, AmenityRepository, AmenityStatus, PackageStatus, PackageTerm,
};
use noah_core::page::Page;
use noah_core::RepoResult;

pub struct PgAmenityRepository {
    pool: PgPool,
}

impl PgAmenityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AmenityRow {
    amenity_id: Uuid,
    name: String,
    location: Option<String>,
    status: String,
}

impl AmenityRow {
    fn into_amenity(self) -> Result<Amenity, noah_core::BoxError> {
        Ok(Amenity {
            amenity_id: self.amenity_id,
            name: self.name,
            location: self.location,
            status: self.status.parse::<AmenityStatus>()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    package_id: Uuid,
    amenity_id: Uuid,
    name: String,
    price_vnd: i64,
    period_unit: String,
    period_count: i32,
    status: String,
}

impl PackageRow {
    fn into_package(self) -> Result<AmenityPackage, noah_core::BoxError> {
        let count = u32::try_from(self.period_count)
            .map_err(|_| format!("negative period count on package {}", self.package_id))?;
        let term = match self.period_unit.as_str() {
            "DAYS" => PackageTerm::Days(count),
            "MONTHS" => PackageTerm::Months(count),
            other => return Err(format!("unknown period unit: {other}").into()),
        };
        Ok(AmenityPackage {
            package_id: self.package_id,
            amenity_id: self.amenity_id,
            name: self.name,
            price_vnd: self.price_vnd,
            term,
            status: self.status.parse::<PackageStatus>()?,
        })
    }
}

fn term_columns(term: PackageTerm) -> (&'static str, i32) {
    match term {
        PackageTerm::Days(n) => ("DAYS", n as i32),
        PackageTerm::Months(n) => ("MONTHS", n as i32),
    }
}

#[async_trait]
impl AmenityRepository for PgAmenityRepository {
    async fn create_amenity(&self, amenity: &Amenity) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO amenities (amenity_id, name, location, status) VALUES ($1, $2, $3, $4)",
        )
        .bind(amenity.amenity_id)
        .bind(&amenity.name)
        .bind(&amenity.location)
        .bind(amenity.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_amenity(&self, id: Uuid) -> RepoResult<Option<Amenity>> {
        let row: Option<AmenityRow> = sqlx::query_as(
            "SELECT amenity_id, name, location, status FROM amenities WHERE amenity_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AmenityRow::into_amenity).transpose()
    }

    async fn list_amenities(&self, page: Page) -> RepoResult<Vec<Amenity>> {
        let rows: Vec<AmenityRow> = sqlx::query_as(
            "SELECT amenity_id, name, location, status FROM amenities \
             ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AmenityRow::into_amenity).collect()
    }

    async fn create_package(&self, package: &AmenityPackage) -> RepoResult<()> {
        let (unit, count) = term_columns(package.term);
        sqlx::query(
            r#"
            INSERT INTO amenity_packages
                (package_id, amenity_id, name, price_vnd, period_unit, period_count, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(package.package_id)
        .bind(package.amenity_id)
        .bind(&package.name)
        .bind(package.price_vnd)
        .bind(unit)
        .bind(count)
        .bind(package.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_package(&self, id: Uuid) -> RepoResult<Option<AmenityPackage>> {
        let row: Option<PackageRow> = sqlx::query_as(
            "SELECT package_id, amenity_id, name, price_vnd, period_unit, period_count, status \
             FROM amenity_packages WHERE package_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PackageRow::into_package).transpose()
    }

    async fn list_packages(&self, amenity_id: Uuid) -> RepoResult<Vec<AmenityPackage>> {
        let rows: Vec<PackageRow> = sqlx::query_as(
            "SELECT package_id, amenity_id, name, price_vnd, period_unit, period_count, status \
             FROM amenity_packages WHERE amenity_id = $1 ORDER BY name",
        )
        .bind(amenity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PackageRow::into_package).collect()
    }
}
