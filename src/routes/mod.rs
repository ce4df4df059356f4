pub mod auth;
pub mod videos;

use axum::Router;

use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new().merge(auth::router()).merge(videos::router())
}
