use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};

use crate::{
    auth::CurrentUser,
    error::AppError,
    forms::{FieldErrors, TagForm},
    models::tag::Tag,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(tags_list))
        .route("/tags/new", post(tag_new_submit))
}

#[derive(Template)]
#[template(path = "tags/list.html")]
struct TagsTemplate {
    logged_in: bool,
    tags: Vec<String>,
    errors: FieldErrors,
    name: String,
}

async fn tags_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let tags = Tag::list_for_owner(&state.db, user.id).await?;
    Ok(AskamaTemplateResponse::into_response(TagsTemplate {
        logged_in: true,
        tags: tags.into_iter().map(|tag| tag.name).collect(),
        errors: FieldErrors::new(),
        name: String::new(),
    }))
}

async fn tag_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TagForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => return render_tag_errors(&state, user.id, &form, errors).await,
    };
    match Tag::create(&state.db, user.id, &name).await {
        Ok(_) => Ok(Redirect::to("/tags").into_response()),
        Err(AppError::BadRequest(message)) => {
            render_tag_errors(&state, user.id, &form, vec![message]).await
        }
        Err(err) => Err(err),
    }
}

async fn render_tag_errors(
    state: &AppState,
    owner: i64,
    form: &TagForm,
    errors: FieldErrors,
) -> Result<Response, AppError> {
    let tags = Tag::list_for_owner(&state.db, owner).await?;
    Ok((
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(TagsTemplate {
            logged_in: true,
            tags: tags.into_iter().map(|tag| tag.name).collect(),
            errors,
            name: form.name.clone(),
        }),
    )
        .into_response())
}
