use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    forms::{FieldErrors, PackingItemForm, TripPackingForm},
    models::{
        packing::{PackingItem, TripPackingItem},
        trip::Trip,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/packing/items", get(items_list))
        .route("/packing/items/new", get(item_new_form).post(item_new_submit))
        .route(
            "/trips/:trip_id/packing/add",
            get(link_add_form).post(link_add_submit),
        )
        .route("/packing/:id/toggle", post(link_toggle))
        .route("/api/packing/:id/toggle", post(link_toggle_api))
        .route("/packing/:id/remove", post(link_remove))
}

#[derive(Clone)]
struct ItemRow {
    name: String,
    category: String,
}

#[derive(Template)]
#[template(path = "packing/items.html")]
struct ItemsTemplate {
    logged_in: bool,
    items: Vec<ItemRow>,
}

async fn items_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let items = PackingItem::list_for_owner(&state.db, user.id).await?;
    Ok(AskamaTemplateResponse::into_response(ItemsTemplate {
        logged_in: true,
        items: items
            .into_iter()
            .map(|item| ItemRow {
                name: item.name,
                category: item.category,
            })
            .collect(),
    }))
}

#[derive(Template)]
#[template(path = "packing/item_form.html")]
struct ItemFormTemplate {
    logged_in: bool,
    errors: FieldErrors,
    name: String,
    category: String,
}

async fn item_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(ItemFormTemplate {
        logged_in: true,
        errors: FieldErrors::new(),
        name: String::new(),
        category: String::new(),
    }))
}

async fn item_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<PackingItemForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(render_item_errors(&form, errors)),
    };
    match PackingItem::create(&state.db, user.id, &input).await {
        Ok(_) => Ok(Redirect::to("/packing/items").into_response()),
        Err(AppError::BadRequest(message)) => Ok(render_item_errors(&form, vec![message])),
        Err(err) => Err(err),
    }
}

fn render_item_errors(form: &PackingItemForm, errors: FieldErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(ItemFormTemplate {
            logged_in: true,
            errors,
            name: form.name.clone(),
            category: form.category.clone(),
        }),
    )
        .into_response()
}

#[derive(Clone)]
struct ItemOption {
    id: i64,
    label: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "packing/link_form.html")]
struct LinkFormTemplate {
    logged_in: bool,
    trip_title: String,
    action: String,
    back_url: String,
    errors: FieldErrors,
    items: Vec<ItemOption>,
    quantity: String,
    is_packed: bool,
    note: String,
}

fn render_link_form(
    trip: &Trip,
    form: &TripPackingForm,
    items: &[PackingItem],
    errors: FieldErrors,
) -> LinkFormTemplate {
    LinkFormTemplate {
        logged_in: true,
        trip_title: trip.title.clone(),
        action: format!("/trips/{}/packing/add", trip.id),
        back_url: format!("/trips/{}", trip.id),
        errors,
        items: items
            .iter()
            .map(|item| ItemOption {
                id: item.id,
                label: if item.category.is_empty() {
                    item.name.clone()
                } else {
                    format!("{} ({})", item.name, item.category)
                },
                selected: form.item == item.id.to_string(),
            })
            .collect(),
        quantity: form.quantity.clone(),
        is_packed: form.is_packed.is_some(),
        note: form.note.clone(),
    }
}

async fn link_add_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = PackingItem::list_for_owner(&state.db, user.id).await?;
    let form = TripPackingForm {
        quantity: "1".to_string(),
        ..TripPackingForm::default()
    };
    Ok(AskamaTemplateResponse::into_response(render_link_form(
        &trip,
        &form,
        &items,
        FieldErrors::new(),
    )))
}

async fn link_add_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<i64>,
    Form(form): Form<TripPackingForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = Trip::find_owned(&state.db, trip_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let items = PackingItem::list_for_owner(&state.db, user.id).await?;
    let input = match form.validate(&items) {
        Ok(input) => input,
        Err(errors) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                AskamaTemplateResponse::into_response(render_link_form(
                    &trip, &form, &items, errors,
                )),
            )
                .into_response())
        }
    };
    match TripPackingItem::add(&state.db, trip.id, &input).await {
        Ok(_) => Ok(Redirect::to(&format!("/trips/{trip_id}")).into_response()),
        Err(AppError::BadRequest(message)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(render_link_form(
                &trip,
                &form,
                &items,
                vec![message],
            )),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

async fn link_toggle(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let link = TripPackingItem::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    TripPackingItem::toggle(&state.db, link.id).await?;
    Ok(Redirect::to(&format!("/trips/{}", link.trip_id)))
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub ok: bool,
    pub is_packed: bool,
    pub packed_count: i64,
    pub total_count: i64,
}

/// JSON twin of `link_toggle` for the async checkbox on the trip page.
async fn link_toggle_api(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ToggleResponse>, AppError> {
    let user = current.require_user()?;
    let link = TripPackingItem::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let is_packed = TripPackingItem::toggle(&state.db, link.id).await?;
    let (packed_count, total_count) = TripPackingItem::counts(&state.db, link.trip_id).await?;
    Ok(Json(ToggleResponse {
        ok: true,
        is_packed,
        packed_count,
        total_count,
    }))
}

async fn link_remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let link = TripPackingItem::find_owned(&state.db, id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    TripPackingItem::remove(&state.db, link.id).await?;
    Ok(Redirect::to(&format!("/trips/{}", link.trip_id)))
}
