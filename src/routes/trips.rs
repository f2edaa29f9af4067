use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::FromRow;

use crate::{
    analytics,
    auth::CurrentUser,
    error::AppError,
    forms::{FieldErrors, TripForm},
    models::{
        activity::ActivityWithTags,
        destination::Destination,
        packing::TripPackingItem,
        trip::{Trip, TripFilter, TripSort},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(trip_list))
        .route("/dashboard", get(dashboard))
        .route("/trips/new", get(trip_new_form).post(trip_new_submit))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/edit", get(trip_edit_form).post(trip_edit_submit))
        .route(
            "/trips/:id/delete",
            get(trip_delete_confirm).post(trip_delete_submit),
        )
}

#[derive(Clone)]
struct TripCard {
    id: i64,
    title: String,
    destination: String,
    owner: String,
    dates: String,
    budget: String,
    is_public: bool,
}

#[derive(Clone)]
struct DestinationOption {
    id: i64,
    label: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "trips/list.html")]
struct TripListTemplate {
    logged_in: bool,
    trips: Vec<TripCard>,
    q: String,
    sort: String,
    destinations: Vec<DestinationOption>,
    qs_params: String,
    number: i64,
    total_pages: i64,
    total_count: i64,
    has_prev: bool,
    has_next: bool,
    prev_page: i64,
    next_page: i64,
}

#[derive(Deserialize, Default)]
struct ListQuery {
    q: Option<String>,
    sort: Option<String>,
    dest: Option<String>,
    page: Option<String>,
}

async fn trip_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let q = query.q.unwrap_or_default().trim().to_string();
    let sort = TripSort::from_param(query.sort.as_deref().unwrap_or(""));
    // Only all-digit values count as a destination filter, anything else is
    // treated as unset.
    let dest = query
        .dest
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()))
        .and_then(|raw| raw.parse::<i64>().ok());
    let page = query
        .page
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(1);

    let filter = TripFilter {
        q: q.clone(),
        sort,
        dest,
        page,
    };
    let listing = Trip::list_visible(&state.db, current.id(), &filter).await?;
    let destinations = Destination::list_for_visible_trips(&state.db, current.id()).await?;

    let mut params = url::form_urlencoded::Serializer::new(String::new());
    if !q.is_empty() {
        params.append_pair("q", &q);
    }
    if sort != TripSort::New {
        params.append_pair("sort", sort.as_param());
    }
    if let Some(id) = dest {
        params.append_pair("dest", &id.to_string());
    }
    let qs_params = params.finish();

    let trips = listing
        .items
        .iter()
        .map(|row| TripCard {
            id: row.id,
            title: row.title.clone(),
            destination: destination_label(&row.destination_name, &row.destination_country),
            owner: row.owner_name.clone(),
            dates: format_date_range(row.start_date, row.end_date),
            budget: format_money(row.budget),
            is_public: row.is_public,
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(TripListTemplate {
        logged_in: current.is_logged_in(),
        trips,
        q,
        sort: sort.as_param().to_string(),
        destinations: destinations
            .iter()
            .map(|d| DestinationOption {
                id: d.id,
                label: d.label(),
                selected: dest == Some(d.id),
            })
            .collect(),
        qs_params,
        number: listing.number,
        total_pages: listing.total_pages,
        total_count: listing.total_count,
        has_prev: listing.has_prev(),
        has_next: listing.has_next(),
        prev_page: listing.prev_number(),
        next_page: listing.next_number(),
    }))
}

#[derive(FromRow)]
struct TripStatsRow {
    trips_total: i64,
    public_total: i64,
    total_budget: f64,
    avg_budget: f64,
}

#[derive(FromRow)]
struct SpendStatsRow {
    total_spent: f64,
    avg_cost: f64,
    activity_count: i64,
}

#[derive(FromRow)]
struct TopDestinationRow {
    name: String,
    country: String,
    trips_count: i64,
    budget_sum: f64,
}

#[derive(FromRow)]
struct TopTagRow {
    name: String,
    total: f64,
    uses: i64,
}

#[derive(Clone)]
struct TopDestinationView {
    label: String,
    trips_count: i64,
    budget_sum: String,
}

#[derive(Clone)]
struct TopTagView {
    name: String,
    total: String,
    uses: i64,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    logged_in: bool,
    username: String,
    trips_total: i64,
    public_total: i64,
    private_total: i64,
    total_budget: String,
    avg_budget: String,
    total_spent: String,
    avg_activity_cost: String,
    top_destinations: Vec<TopDestinationView>,
    top_tags: Vec<TopTagView>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;

    let trip_stats = sqlx::query_as::<_, TripStatsRow>(
        "SELECT COUNT(*) AS trips_total, \
         COALESCE(SUM(is_public), 0) AS public_total, \
         COALESCE(SUM(budget), 0.0) AS total_budget, \
         COALESCE(AVG(budget), 0.0) AS avg_budget \
         FROM trips WHERE owner_id = ?1",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let spend_stats = sqlx::query_as::<_, SpendStatsRow>(
        "SELECT COALESCE(SUM(a.cost), 0.0) AS total_spent, \
         COALESCE(AVG(a.cost), 0.0) AS avg_cost, \
         COUNT(a.id) AS activity_count \
         FROM activities a JOIN trips t ON t.id = a.trip_id \
         WHERE t.owner_id = ?1",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let top_destinations = sqlx::query_as::<_, TopDestinationRow>(
        "SELECT d.name, d.country, COUNT(*) AS trips_count, \
         COALESCE(SUM(t.budget), 0.0) AS budget_sum \
         FROM trips t JOIN destinations d ON d.id = t.destination_id \
         WHERE t.owner_id = ?1 \
         GROUP BY d.id ORDER BY trips_count DESC, budget_sum DESC LIMIT 5",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let top_tags = sqlx::query_as::<_, TopTagRow>(
        "SELECT tg.name, COALESCE(SUM(a.cost), 0.0) AS total, COUNT(*) AS uses \
         FROM activity_tags at \
         JOIN tags tg ON tg.id = at.tag_id \
         JOIN activities a ON a.id = at.activity_id \
         JOIN trips t ON t.id = a.trip_id \
         WHERE t.owner_id = ?1 \
         GROUP BY tg.id ORDER BY total DESC LIMIT 5",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(AskamaTemplateResponse::into_response(DashboardTemplate {
        logged_in: true,
        username: user.username.clone(),
        trips_total: trip_stats.trips_total,
        public_total: trip_stats.public_total,
        private_total: trip_stats.trips_total - trip_stats.public_total,
        total_budget: format_money(trip_stats.total_budget),
        avg_budget: format_money(trip_stats.avg_budget),
        total_spent: format_money(spend_stats.total_spent),
        avg_activity_cost: if spend_stats.activity_count > 0 {
            format_money(spend_stats.avg_cost)
        } else {
            "–".to_string()
        },
        top_destinations: top_destinations
            .into_iter()
            .map(|row| TopDestinationView {
                label: destination_label(&row.name, &row.country),
                trips_count: row.trips_count,
                budget_sum: format_money(row.budget_sum),
            })
            .collect(),
        top_tags: top_tags
            .into_iter()
            .map(|row| TopTagView {
                name: row.name,
                total: format_money(row.total),
                uses: row.uses,
            })
            .collect(),
    }))
}

#[derive(Clone)]
struct ActivityRow {
    id: i64,
    title: String,
    date: String,
    cost: String,
    notes: String,
    tags: String,
}

#[derive(Clone)]
struct DayRow {
    date: String,
    total: String,
}

#[derive(Clone)]
struct TagRow {
    name: String,
    total: String,
}

#[derive(Clone)]
struct WeatherRow {
    date: String,
    temp_max: String,
    temp_min: String,
    precipitation_chance: String,
}

#[derive(Clone)]
struct PackingRow {
    id: i64,
    name: String,
    quantity: i64,
    is_packed: bool,
    note: String,
}

#[derive(Template)]
#[template(path = "trips/detail.html")]
struct TripDetailTemplate {
    logged_in: bool,
    is_owner: bool,
    id: i64,
    title: String,
    destination: String,
    description: String,
    dates: String,
    budget: String,
    is_public: bool,
    total_cost: String,
    remaining: String,
    has_budget_pct: bool,
    budget_pct: String,
    activities: Vec<ActivityRow>,
    by_day: Vec<DayRow>,
    by_tag: Vec<TagRow>,
    has_top_activity: bool,
    top_activity: String,
    has_top_day: bool,
    top_day: String,
    weather_summary: String,
    weather_rows: Vec<WeatherRow>,
    packing: Vec<PackingRow>,
    packed_count: i64,
    total_packing: i64,
    has_packed_pct: bool,
    packed_pct: String,
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let trip = Trip::find_visible(&state.db, id, current.id())
        .await?
        .ok_or(AppError::NotFound)?;
    let destination = Destination::find(&state.db, trip.destination_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let activities = ActivityWithTags::list_for_trip(&state.db, trip.id).await?;
    let stats = analytics::analyze(trip.budget, &activities);

    let report = state
        .weather
        .forecast(destination.latitude, destination.longitude)
        .await;
    let weather_rows = report
        .daily_rows()
        .into_iter()
        .map(|day| WeatherRow {
            date: day.date,
            temp_max: format!("{:.0}", day.temp_max),
            temp_min: format!("{:.0}", day.temp_min),
            precipitation_chance: format!("{:.0}", day.precipitation_chance),
        })
        .collect();

    let packing = TripPackingItem::list_for_trip(&state.db, trip.id).await?;
    let (packed_count, total_packing) = TripPackingItem::counts(&state.db, trip.id).await?;
    let packed_pct = analytics::packing_completion(packed_count, total_packing);

    Ok(AskamaTemplateResponse::into_response(TripDetailTemplate {
        logged_in: current.is_logged_in(),
        is_owner: current.id() == Some(trip.owner_id),
        id: trip.id,
        title: trip.title.clone(),
        destination: destination.label(),
        description: destination.description.clone(),
        dates: format_date_range(trip.start_date, trip.end_date),
        budget: format_money(trip.budget),
        is_public: trip.is_public,
        total_cost: format_money(stats.total_cost),
        remaining: format_money(stats.remaining),
        has_budget_pct: stats.budget_pct.is_some(),
        budget_pct: stats
            .budget_pct
            .map(|pct| format!("{pct:.1}"))
            .unwrap_or_default(),
        activities: activities
            .iter()
            .map(|entry| ActivityRow {
                id: entry.activity.id,
                title: entry.activity.title.clone(),
                date: format_date(entry.activity.date),
                cost: format_money(entry.activity.cost),
                notes: entry.activity.notes.clone(),
                tags: entry.tags.join(", "),
            })
            .collect(),
        by_day: stats
            .by_day
            .iter()
            .map(|day| DayRow {
                date: format_date(day.date),
                total: format_money(day.total),
            })
            .collect(),
        by_tag: stats
            .by_tag
            .iter()
            .map(|tag| TagRow {
                name: tag.name.clone(),
                total: format_money(tag.total),
            })
            .collect(),
        has_top_activity: stats.most_expensive_activity.is_some(),
        top_activity: stats
            .most_expensive_activity
            .as_ref()
            .map(|top| format!("{} ({} on {})", top.title, format_money(top.cost), format_date(top.date)))
            .unwrap_or_default(),
        has_top_day: stats.most_expensive_day.is_some(),
        top_day: stats
            .most_expensive_day
            .as_ref()
            .map(|day| format!("{} ({})", format_date(day.date), format_money(day.total)))
            .unwrap_or_default(),
        weather_summary: report.summary,
        weather_rows,
        packing: packing
            .into_iter()
            .map(|link| PackingRow {
                id: link.id,
                name: link.item_name,
                quantity: link.quantity,
                is_packed: link.is_packed,
                note: link.note,
            })
            .collect(),
        packed_count,
        total_packing,
        has_packed_pct: packed_pct.is_some(),
        packed_pct: packed_pct.map(|pct| format!("{pct:.1}")).unwrap_or_default(),
    }))
}

#[derive(Template)]
#[template(path = "trips/form.html")]
struct TripFormTemplate {
    logged_in: bool,
    page_title: String,
    action: String,
    back_url: String,
    errors: FieldErrors,
    title: String,
    start_date: String,
    end_date: String,
    budget: String,
    is_public: bool,
    destinations: Vec<DestinationOption>,
}

fn render_trip_form(
    page_title: &str,
    action: String,
    back_url: String,
    form: &TripForm,
    destinations: &[Destination],
    errors: FieldErrors,
) -> TripFormTemplate {
    TripFormTemplate {
        logged_in: true,
        page_title: page_title.to_string(),
        action,
        back_url,
        errors,
        title: form.title.clone(),
        start_date: form.start_date.clone(),
        end_date: form.end_date.clone(),
        budget: form.budget.clone(),
        is_public: form.is_public.is_some(),
        destinations: destinations
            .iter()
            .map(|d| DestinationOption {
                id: d.id,
                label: d.label(),
                selected: form.destination == d.id.to_string(),
            })
            .collect(),
    }
}

async fn trip_new_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    let destinations = Destination::list_all(&state.db).await?;
    let form = TripForm {
        is_public: Some("on".into()),
        ..TripForm::default()
    };
    Ok(AskamaTemplateResponse::into_response(render_trip_form(
        "New trip",
        "/trips/new".to_string(),
        "/".to_string(),
        &form,
        &destinations,
        FieldErrors::new(),
    )))
}

async fn trip_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TripForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let destinations = Destination::list_all(&state.db).await?;
    match form.validate(&destinations) {
        Ok(input) => {
            let id = Trip::insert(&state.db, user.id, &input).await?;
            Ok(Redirect::to(&format!("/trips/{id}")).into_response())
        }
        Err(errors) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(render_trip_form(
                "New trip",
                "/trips/new".to_string(),
                "/".to_string(),
                &form,
                &destinations,
                errors,
            )),
        )
            .into_response()),
    }
}

async fn trip_edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let destinations = Destination::list_all(&state.db).await?;
    let form = TripForm::from_trip(&trip);
    Ok(AskamaTemplateResponse::into_response(render_trip_form(
        "Edit trip",
        format!("/trips/{id}/edit"),
        format!("/trips/{id}"),
        &form,
        &destinations,
        FieldErrors::new(),
    )))
}

async fn trip_edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<TripForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let destinations = Destination::list_all(&state.db).await?;
    match form.validate(&destinations) {
        Ok(input) => {
            Trip::update(&state.db, trip.id, &input).await?;
            Ok(Redirect::to(&format!("/trips/{id}")).into_response())
        }
        Err(errors) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(render_trip_form(
                "Edit trip",
                format!("/trips/{id}/edit"),
                format!("/trips/{id}"),
                &form,
                &destinations,
                errors,
            )),
        )
            .into_response()),
    }
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub logged_in: bool,
    pub page_title: String,
    pub object_label: String,
    pub post_url: String,
    pub back_url: String,
}

async fn trip_delete_confirm(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(AskamaTemplateResponse::into_response(ConfirmDeleteTemplate {
        logged_in: true,
        page_title: "Delete trip".to_string(),
        object_label: trip.title,
        post_url: format!("/trips/{id}/delete"),
        back_url: format!("/trips/{id}"),
    }))
}

async fn trip_delete_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Trip::delete(&state.db, trip.id).await?;
    Ok(Redirect::to("/"))
}

pub(crate) fn format_money(value: f64) -> String {
    format!("{value:.2}")
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} – {}", format_date(start), format_date(end))
}

fn destination_label(name: &str, country: &str) -> String {
    if country.is_empty() {
        name.to_string()
    } else {
        format!("{name}, {country}")
    }
}
