use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{db::DbPool, error::AppError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
}

impl Tag {
    pub async fn list_for_owner(db: &DbPool, owner: i64) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT id, owner_id, name FROM tags WHERE owner_id = ?1 ORDER BY name",
        )
        .bind(owner)
        .fetch_all(db)
        .await?;
        Ok(tags)
    }

    pub async fn create(db: &DbPool, owner: i64, name: &str) -> Result<i64, AppError> {
        let result = sqlx::query("INSERT INTO tags (owner_id, name) VALUES (?1, ?2)")
            .bind(owner)
            .bind(name)
            .execute(db)
            .await;
        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(AppError::BadRequest(
                "You already have a tag with that name.".into(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
