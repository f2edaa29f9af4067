use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db::DbPool, error::AppError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i64,
    pub trip_id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub cost: f64,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct ActivityInput {
    pub title: String,
    pub date: NaiveDate,
    pub cost: f64,
    pub notes: String,
    pub tag_ids: Vec<i64>,
}

/// An activity together with its tag names, the shape the analytics and the
/// trip page consume.
#[derive(Debug, Clone)]
pub struct ActivityWithTags {
    pub activity: Activity,
    pub tags: Vec<String>,
}

#[derive(FromRow)]
struct TagLinkRow {
    activity_id: i64,
    name: String,
}

impl Activity {
    pub async fn find(db: &DbPool, id: i64) -> Result<Option<Activity>, AppError> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT id, trip_id, title, date, cost, notes FROM activities WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(activity)
    }

    /// Resolves through the owning trip; a non-owner sees `None`.
    pub async fn find_owned(
        db: &DbPool,
        id: i64,
        owner: i64,
    ) -> Result<Option<Activity>, AppError> {
        let activity = sqlx::query_as::<_, Activity>(
            "SELECT a.id, a.trip_id, a.title, a.date, a.cost, a.notes \
             FROM activities a JOIN trips t ON t.id = a.trip_id \
             WHERE a.id = ?1 AND t.owner_id = ?2",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(db)
        .await?;
        Ok(activity)
    }

    pub async fn insert(db: &DbPool, trip_id: i64, input: &ActivityInput) -> Result<i64, AppError> {
        let id = sqlx::query(
            "INSERT INTO activities (trip_id, title, date, cost, notes) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(trip_id)
        .bind(&input.title)
        .bind(input.date)
        .bind(input.cost)
        .bind(&input.notes)
        .execute(db)
        .await?
        .last_insert_rowid();
        Self::set_tags(db, id, &input.tag_ids).await?;
        Ok(id)
    }

    pub async fn update(db: &DbPool, id: i64, input: &ActivityInput) -> Result<(), AppError> {
        sqlx::query("UPDATE activities SET title = ?1, date = ?2, cost = ?3, notes = ?4 WHERE id = ?5")
            .bind(&input.title)
            .bind(input.date)
            .bind(input.cost)
            .bind(&input.notes)
            .bind(id)
            .execute(db)
            .await?;
        Self::set_tags(db, id, &input.tag_ids).await?;
        Ok(())
    }

    pub async fn delete(db: &DbPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM activities WHERE id = ?1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn tag_ids(db: &DbPool, id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT tag_id FROM activity_tags WHERE activity_id = ?1 ORDER BY tag_id",
        )
        .bind(id)
        .fetch_all(db)
        .await?;
        Ok(ids)
    }

    async fn set_tags(db: &DbPool, id: i64, tag_ids: &[i64]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM activity_tags WHERE activity_id = ?1")
            .bind(id)
            .execute(db)
            .await?;
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO activity_tags (activity_id, tag_id) VALUES (?1, ?2)")
                .bind(id)
                .bind(tag_id)
                .execute(db)
                .await?;
        }
        Ok(())
    }
}

impl ActivityWithTags {
    /// Fully materialized activity list for a trip, date then title order,
    /// tag names attached.
    pub async fn list_for_trip(db: &DbPool, trip_id: i64) -> Result<Vec<ActivityWithTags>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT id, trip_id, title, date, cost, notes \
             FROM activities WHERE trip_id = ?1 ORDER BY date, title",
        )
        .bind(trip_id)
        .fetch_all(db)
        .await?;

        let links = sqlx::query_as::<_, TagLinkRow>(
            "SELECT at.activity_id, tg.name \
             FROM activity_tags at \
             JOIN tags tg ON tg.id = at.tag_id \
             JOIN activities a ON a.id = at.activity_id \
             WHERE a.trip_id = ?1 ORDER BY tg.name",
        )
        .bind(trip_id)
        .fetch_all(db)
        .await?;

        let mut by_activity: HashMap<i64, Vec<String>> = HashMap::new();
        for link in links {
            by_activity.entry(link.activity_id).or_default().push(link.name);
        }

        Ok(activities
            .into_iter()
            .map(|activity| {
                let tags = by_activity.remove(&activity.id).unwrap_or_default();
                ActivityWithTags { activity, tags }
            })
            .collect())
    }
}
