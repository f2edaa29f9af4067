use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db::DbPool, error::AppError, models::tag::is_unique_violation};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PackingItem {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct PackingItemInput {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripPackingItem {
    pub id: i64,
    pub trip_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub is_packed: bool,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct TripPackingInput {
    pub item_id: i64,
    pub quantity: i64,
    pub is_packed: bool,
    pub note: String,
}

/// Display row for a trip's packing list, item name joined in.
#[derive(Debug, Clone, FromRow)]
pub struct PackingLinkRow {
    pub id: i64,
    pub item_name: String,
    pub item_category: String,
    pub quantity: i64,
    pub is_packed: bool,
    pub note: String,
}

impl PackingItem {
    pub async fn list_for_owner(db: &DbPool, owner: i64) -> Result<Vec<PackingItem>, AppError> {
        let items = sqlx::query_as::<_, PackingItem>(
            "SELECT id, owner_id, name, category FROM packing_items \
             WHERE owner_id = ?1 ORDER BY category, name",
        )
        .bind(owner)
        .fetch_all(db)
        .await?;
        Ok(items)
    }

    pub async fn create(db: &DbPool, owner: i64, input: &PackingItemInput) -> Result<i64, AppError> {
        let result = sqlx::query("INSERT INTO packing_items (owner_id, name, category) VALUES (?1, ?2, ?3)")
            .bind(owner)
            .bind(&input.name)
            .bind(&input.category)
            .execute(db)
            .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(AppError::BadRequest(
                "You already have an item with that name.".into(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

impl TripPackingItem {
    /// Resolves through the owning trip; a non-owner sees `None`.
    pub async fn find_owned(
        db: &DbPool,
        id: i64,
        owner: i64,
    ) -> Result<Option<TripPackingItem>, AppError> {
        let link = sqlx::query_as::<_, TripPackingItem>(
            "SELECT l.id, l.trip_id, l.item_id, l.quantity, l.is_packed, l.note \
             FROM trip_packing_items l JOIN trips t ON t.id = l.trip_id \
             WHERE l.id = ?1 AND t.owner_id = ?2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(db)
        .await?;
        Ok(link)
    }

    pub async fn add(db: &DbPool, trip_id: i64, input: &TripPackingInput) -> Result<i64, AppError> {
        let result = sqlx::query(
            "INSERT INTO trip_packing_items (trip_id, item_id, quantity, is_packed, note) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(trip_id)
        .bind(input.item_id)
        .bind(input.quantity)
        .bind(input.is_packed)
        .bind(&input.note)
        .execute(db)
        .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(AppError::BadRequest(
                "That item is already on this trip's packing list.".into(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Flips `is_packed` and returns the new value.
    pub async fn toggle(db: &DbPool, id: i64) -> Result<bool, AppError> {
        sqlx::query("UPDATE trip_packing_items SET is_packed = NOT is_packed WHERE id = ?1")
            .bind(id)
            .execute(db)
            .await?;
        let is_packed: bool =
            sqlx::query_scalar("SELECT is_packed FROM trip_packing_items WHERE id = ?1")
                .bind(id)
                .fetch_one(db)
                .await?;
        Ok(is_packed)
    }

    pub async fn remove(db: &DbPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM trip_packing_items WHERE id = ?1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn list_for_trip(db: &DbPool, trip_id: i64) -> Result<Vec<PackingLinkRow>, AppError> {
        let links = sqlx::query_as::<_, PackingLinkRow>(
            "SELECT l.id, i.name AS item_name, i.category AS item_category, \
             l.quantity, l.is_packed, l.note \
             FROM trip_packing_items l JOIN packing_items i ON i.id = l.item_id \
             WHERE l.trip_id = ?1 ORDER BY i.name",
        )
        .bind(trip_id)
        .fetch_all(db)
        .await?;
        Ok(links)
    }

    /// (packed, total) for a trip's list.
    pub async fn counts(db: &DbPool, trip_id: i64) -> Result<(i64, i64), AppError> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(is_packed), 0), COUNT(*) \
             FROM trip_packing_items WHERE trip_id = ?1",
        )
        .bind(trip_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }
}
