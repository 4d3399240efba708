use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::ApiJson;
use crate::{
    envelope::Envelope,
    error::AppError,
    models::trip::{HistoryFilter, HistoryQuery, Trip},
    services::trips::{EndTrip, StartTrip, TelemetryUpdate},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_trip))
        .route("/end", post(end_trip))
        .route("/history/:user_id", get(trip_history))
        .route("/history/filter/:user_id", get(filter_trip_history))
        .route("/:trip_id", get(trip_details))
        .route("/:trip_id/update", put(update_trip))
        .route("/:trip_id/notes", post(add_trip_notes))
}

async fn start_trip(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<StartTrip>,
) -> Result<Envelope<Trip>, AppError> {
    let trip = state.trips.start(request).await?;
    Ok(Envelope::ok("Trip started", trip))
}

async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    ApiJson(update): ApiJson<TelemetryUpdate>,
) -> Result<Envelope<Trip>, AppError> {
    let trip = state.trips.append_telemetry(&trip_id, update).await?;
    Ok(Envelope::ok("Trip updated", trip))
}

async fn end_trip(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EndTrip>,
) -> Result<Envelope<Trip>, AppError> {
    let trip = state.trips.end(request).await?;
    Ok(Envelope::ok("Trip completed", trip))
}

#[derive(Debug, Deserialize)]
struct NotesRequest {
    notes: Option<String>,
}

async fn add_trip_notes(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    ApiJson(request): ApiJson<NotesRequest>,
) -> Result<Envelope<Trip>, AppError> {
    let note = request.notes.unwrap_or_default();
    let trip = state.trips.add_note(&trip_id, &note).await?;
    Ok(Envelope::ok("Notes added", trip))
}

async fn trip_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Envelope<Vec<Trip>>, AppError> {
    let trips = state
        .trips
        .history(&user_id, &HistoryFilter::default())
        .await?;
    Ok(Envelope::ok("Trip history retrieved", trips))
}

async fn filter_trip_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Envelope<Vec<Trip>>, AppError> {
    let filter = HistoryFilter::try_from(query)?;
    let trips = state.trips.history(&user_id, &filter).await?;
    Ok(Envelope::ok("Trip history retrieved", trips))
}

async fn trip_details(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Envelope<Trip>, AppError> {
    let trip = state.trips.details(&trip_id).await?;
    Ok(Envelope::ok("Trip retrieved", trip))
}
