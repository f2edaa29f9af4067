pub mod activities;
pub mod packing;
pub mod public;
pub mod tags;
pub mod trips;

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(trips::router())
        .merge(activities::router())
        .merge(packing::router())
        .merge(tags::router())
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}
