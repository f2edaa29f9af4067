use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::{db::DbPool, error::AppError};

pub const PAGE_SIZE: i64 = 10;

const TRIP_COLUMNS: &str =
    "id, owner_id, title, destination_id, start_date, end_date, budget, is_public, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub destination_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Validated field set for inserts and updates; produced by the form layer.
#[derive(Debug, Clone)]
pub struct TripInput {
    pub title: String,
    pub destination_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub is_public: bool,
}

/// Listing row with the joined names the list page shows.
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub destination_name: String,
    pub destination_country: String,
    pub owner_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripSort {
    #[default]
    New,
    Budget,
    Start,
}

impl TripSort {
    /// Unknown values fall back to newest-first rather than erroring.
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "budget" => TripSort::Budget,
            "start" => TripSort::Start,
            _ => TripSort::New,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            TripSort::New => "new",
            TripSort::Budget => "budget",
            TripSort::Start => "start",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    pub q: String,
    pub sort: TripSort,
    pub dest: Option<i64>,
    pub page: i64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn prev_number(&self) -> i64 {
        (self.number - 1).max(1)
    }

    pub fn next_number(&self) -> i64 {
        (self.number + 1).min(self.total_pages)
    }
}

impl Trip {
    pub async fn find(db: &DbPool, id: i64) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }

    /// Visibility gate: public, or owned by the viewer. Anything else reads
    /// as absent so private trips do not leak their existence.
    pub async fn find_visible(
        db: &DbPool,
        id: i64,
        viewer: Option<i64>,
    ) -> Result<Option<Trip>, AppError> {
        let trip = Self::find(db, id).await?;
        Ok(trip.filter(|t| t.is_public || viewer == Some(t.owner_id)))
    }

    /// Writes require ownership; a non-owner gets the same `None` as a
    /// missing id.
    pub async fn find_owned(db: &DbPool, id: i64, owner: i64) -> Result<Option<Trip>, AppError> {
        let trip = Self::find(db, id).await?;
        Ok(trip.filter(|t| t.owner_id == owner))
    }

    pub async fn insert(db: &DbPool, owner: i64, input: &TripInput) -> Result<i64, AppError> {
        let id = sqlx::query(
            "INSERT INTO trips (owner_id, title, destination_id, start_date, end_date, budget, is_public, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(owner)
        .bind(&input.title)
        .bind(input.destination_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .bind(input.is_public)
        .bind(Utc::now())
        .execute(db)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn update(db: &DbPool, id: i64, input: &TripInput) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE trips SET title = ?1, destination_id = ?2, start_date = ?3, end_date = ?4, \
             budget = ?5, is_public = ?6 WHERE id = ?7",
        )
        .bind(&input.title)
        .bind(input.destination_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .bind(input.is_public)
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn delete(db: &DbPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn list_visible(
        db: &DbPool,
        viewer: Option<i64>,
        filter: &TripFilter,
    ) -> Result<Page<TripRow>, AppError> {
        let mut count_query = QueryBuilder::new(
            "SELECT COUNT(*) FROM trips t JOIN destinations d ON d.id = t.destination_id",
        );
        push_filters(&mut count_query, viewer, filter);
        let total_count: i64 = count_query.build_query_scalar().fetch_one(db).await?;

        let total_pages = ((total_count + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
        let number = filter.page.clamp(1, total_pages);

        let mut query = QueryBuilder::new(
            "SELECT t.id, t.owner_id, t.title, t.start_date, t.end_date, t.budget, t.is_public, \
             t.created_at, d.name AS destination_name, d.country AS destination_country, \
             u.username AS owner_name \
             FROM trips t \
             JOIN destinations d ON d.id = t.destination_id \
             JOIN users u ON u.id = t.owner_id",
        );
        push_filters(&mut query, viewer, filter);
        match filter.sort {
            TripSort::New => query.push(" ORDER BY t.created_at DESC, t.id DESC"),
            TripSort::Budget => query.push(" ORDER BY t.budget DESC, t.created_at DESC"),
            TripSort::Start => query.push(" ORDER BY t.start_date ASC, t.created_at DESC"),
        };
        query.push(" LIMIT ");
        query.push_bind(PAGE_SIZE);
        query.push(" OFFSET ");
        query.push_bind((number - 1) * PAGE_SIZE);

        let items = query.build_query_as::<TripRow>().fetch_all(db).await?;
        Ok(Page {
            items,
            number,
            total_pages,
            total_count,
        })
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, viewer: Option<i64>, filter: &TripFilter) {
    query.push(" WHERE (t.is_public = 1 OR t.owner_id = ");
    query.push_bind(viewer.unwrap_or(-1));
    query.push(")");

    let term = filter.q.trim();
    if !term.is_empty() {
        let pattern = like_pattern(term);
        query.push(" AND (LOWER(t.title) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" ESCAPE '\\' OR LOWER(d.name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" ESCAPE '\\' OR LOWER(d.country) LIKE ");
        query.push_bind(pattern);
        query.push(" ESCAPE '\\')");
    }

    if let Some(dest) = filter.dest {
        query.push(" AND t.destination_id = ");
        query.push_bind(dest);
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
