pub mod auth;
pub mod location;
pub mod notifications;
pub mod ratings;
pub mod sync;
pub mod trips;
pub mod users;

use axum::{extract::FromRequest, Router};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

/// JSON body extractor whose rejections render as envelopes.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/users", users::router())
        .nest("/api/auth", auth::router())
        .nest("/api/trips", trips::router())
        .nest("/api/location", location::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/sync", sync::router())
        .nest("/api/ratings", ratings::router())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::not_found("Route not found")
}
