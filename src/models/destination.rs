use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db::DbPool, error::AppError};

/// Shared destination catalog. There is no public CRUD surface for these;
/// the seed migration ships a starter set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Destination {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Destination {
    pub fn label(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }

    pub async fn find(db: &DbPool, id: i64) -> Result<Option<Destination>, AppError> {
        let destination = sqlx::query_as::<_, Destination>(
            "SELECT id, name, country, description, latitude, longitude \
             FROM destinations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(destination)
    }

    pub async fn list_all(db: &DbPool) -> Result<Vec<Destination>, AppError> {
        let destinations = sqlx::query_as::<_, Destination>(
            "SELECT id, name, country, description, latitude, longitude \
             FROM destinations ORDER BY country, name",
        )
        .fetch_all(db)
        .await?;
        Ok(destinations)
    }

    /// Destinations referenced by at least one trip the viewer may see,
    /// for the list page's filter dropdown.
    pub async fn list_for_visible_trips(
        db: &DbPool,
        viewer: Option<i64>,
    ) -> Result<Vec<Destination>, AppError> {
        let destinations = sqlx::query_as::<_, Destination>(
            "SELECT DISTINCT d.id, d.name, d.country, d.description, d.latitude, d.longitude \
             FROM destinations d \
             JOIN trips t ON t.destination_id = d.id \
             WHERE t.is_public = 1 OR t.owner_id = ?1 \
             ORDER BY d.country, d.name",
        )
        .bind(viewer.unwrap_or(-1))
        .fetch_all(db)
        .await?;
        Ok(destinations)
    }
}
