use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};

use super::ApiJson;
use crate::{
    auth::AuthenticatedUser,
    envelope::Envelope,
    error::AppError,
    models::trip::Trip,
    services::ratings::{AverageRating, RatingSubmission, TripRating},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_rating))
        .route("/user/:user_id", get(user_average_rating))
        .route("/:trip_id", get(trip_rating))
}

async fn submit_rating(
    State(state): State<AppState>,
    _current: AuthenticatedUser,
    ApiJson(submission): ApiJson<RatingSubmission>,
) -> Result<Envelope<Trip>, AppError> {
    let trip = state.ratings.submit(submission).await?;
    Ok(Envelope::ok("Rating submitted successfully.", trip))
}

async fn trip_rating(
    State(state): State<AppState>,
    _current: AuthenticatedUser,
    Path(trip_id): Path<String>,
) -> Result<Envelope<TripRating>, AppError> {
    let rating = state.ratings.for_trip(&trip_id).await?;
    Ok(Envelope::ok("Rating retrieved", rating))
}

async fn user_average_rating(
    State(state): State<AppState>,
    _current: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Envelope<AverageRating>, AppError> {
    let average = state.ratings.user_average(&user_id).await?;
    Ok(Envelope::ok("Average rating calculated", average))
}
