use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use noah_core::residence::{Apartment, ApartmentRepository};
use noah_core::RepoResult;

pub struct PgApartmentRepository {
    pool: PgPool,
}

impl PgApartmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApartmentRow {
    apartment_id: Uuid,
    code: String,
    floor: Option<i32>,
}

impl ApartmentRow {
    fn into_apartment(self) -> Apartment {
        Apartment {
            apartment_id: self.apartment_id,
            code: self.code,
            floor: self.floor,
        }
    }
}

#[async_trait]
impl ApartmentRepository for PgApartmentRepository {
    async fn get_apartment(&self, id: Uuid) -> RepoResult<Option<Apartment>> {
        let row: Option<ApartmentRow> = sqlx::query_as(
            "SELECT apartment_id, code, floor FROM apartments WHERE apartment_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApartmentRow::into_apartment))
    }

    async fn primary_apartment_of(&self, user_id: Uuid) -> RepoResult<Option<Apartment>> {
        let row: Option<ApartmentRow> = sqlx::query_as(
            r#"
            SELECT a.apartment_id, a.code, a.floor
            FROM apartments a
            JOIN resident_profiles rp ON rp.apartment_id = a.apartment_id
            WHERE rp.user_id = $1 AND rp.is_primary
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ApartmentRow::into_apartment))
    }
}
