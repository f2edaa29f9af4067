use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::Form;

use crate::{
    auth::CurrentUser,
    error::AppError,
    forms::{ActivityForm, FieldErrors},
    models::{
        activity::Activity,
        tag::Tag,
        trip::Trip,
    },
    state::AppState,
};

use super::trips::{format_date, format_money, ConfirmDeleteTemplate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/trips/:trip_id/activities/new",
            get(activity_new_form).post(activity_new_submit),
        )
        .route(
            "/activities/:id/edit",
            get(activity_edit_form).post(activity_edit_submit),
        )
        .route(
            "/activities/:id/delete",
            get(activity_delete_confirm).post(activity_delete_submit),
        )
}

#[derive(Clone)]
struct TagOption {
    id: i64,
    name: String,
    checked: bool,
}

#[derive(Template)]
#[template(path = "activities/form.html")]
struct ActivityFormTemplate {
    logged_in: bool,
    page_title: String,
    action: String,
    back_url: String,
    errors: FieldErrors,
    title: String,
    date: String,
    cost: String,
    notes: String,
    trip_dates: String,
    tags: Vec<TagOption>,
}

fn render_activity_form(
    page_title: &str,
    action: String,
    trip: &Trip,
    form: &ActivityForm,
    owner_tags: &[Tag],
    errors: FieldErrors,
) -> ActivityFormTemplate {
    ActivityFormTemplate {
        logged_in: true,
        page_title: page_title.to_string(),
        action,
        back_url: format!("/trips/{}", trip.id),
        errors,
        title: form.title.clone(),
        date: form.date.clone(),
        cost: form.cost.clone(),
        notes: form.notes.clone(),
        trip_dates: format!(
            "{} – {}",
            format_date(trip.start_date),
            format_date(trip.end_date)
        ),
        tags: owner_tags
            .iter()
            .map(|tag| TagOption {
                id: tag.id,
                name: tag.name.clone(),
                checked: form.tags.iter().any(|raw| raw == &tag.id.to_string()),
            })
            .collect(),
    }
}

async fn activity_new_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner_tags = Tag::list_for_owner(&state.db, user.id).await?;
    Ok(AskamaTemplateResponse::into_response(render_activity_form(
        "New activity",
        format!("/trips/{trip_id}/activities/new"),
        &trip,
        &ActivityForm::default(),
        &owner_tags,
        FieldErrors::new(),
    )))
}

async fn activity_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    Form(form): Form<ActivityForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner_tags = Tag::list_for_owner(&state.db, user.id).await?;
    match form.validate(&trip, &owner_tags) {
        Ok(input) => {
            Activity::insert(&state.db, trip.id, &input).await?;
            Ok(Redirect::to(&format!("/trips/{trip_id}")).into_response())
        }
        Err(errors) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(render_activity_form(
                "New activity",
                format!("/trips/{trip_id}/activities/new"),
                &trip,
                &form,
                &owner_tags,
                errors,
            )),
        )
            .into_response()),
    }
}

async fn activity_edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let activity = Activity::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let trip = Trip::find_owned(&state.db, activity.trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner_tags = Tag::list_for_owner(&state.db, user.id).await?;
    let tag_ids = Activity::tag_ids(&state.db, activity.id).await?;

    let form = ActivityForm {
        title: activity.title.clone(),
        date: format_date(activity.date),
        cost: format_money(activity.cost),
        notes: activity.notes.clone(),
        tags: tag_ids.iter().map(|tag_id| tag_id.to_string()).collect(),
    };
    Ok(AskamaTemplateResponse::into_response(render_activity_form(
        "Edit activity",
        format!("/activities/{id}/edit"),
        &trip,
        &form,
        &owner_tags,
        FieldErrors::new(),
    )))
}

async fn activity_edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ActivityForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let activity = Activity::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let trip = Trip::find_owned(&state.db, activity.trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let owner_tags = Tag::list_for_owner(&state.db, user.id).await?;
    match form.validate(&trip, &owner_tags) {
        Ok(input) => {
            Activity::update(&state.db, activity.id, &input).await?;
            Ok(Redirect::to(&format!("/trips/{}", trip.id)).into_response())
        }
        Err(errors) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(render_activity_form(
                "Edit activity",
                format!("/activities/{id}/edit"),
                &trip,
                &form,
                &owner_tags,
                errors,
            )),
        )
            .into_response()),
    }
}

async fn activity_delete_confirm(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let activity = Activity::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(AskamaTemplateResponse::into_response(ConfirmDeleteTemplate {
        logged_in: true,
        page_title: "Delete activity".to_string(),
        object_label: activity.title,
        post_url: format!("/activities/{id}/delete"),
        back_url: format!("/trips/{}", activity.trip_id),
    }))
}

async fn activity_delete_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let activity = Activity::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let trip_id = activity.trip_id;
    Activity::delete(&state.db, activity.id).await?;
    Ok(Redirect::to(&format!("/trips/{trip_id}")))
}
