use axum::Router;

use crate::AppState;

mod auth;
mod envelope;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminUser, AuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::admin())
        .merge(routes::user())
        .with_state(state)
}
