use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    envelope::Envelope,
    error::AppError,
    services::geocode::{Coordinates, Directions},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/geocode", get(geocode))
        .route("/reverse-geocode", get(reverse_geocode))
        .route("/traffic", get(traffic))
        .route("/route", get(route))
}

#[derive(Debug, Deserialize)]
struct AddressQuery {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoordinatesQuery {
    latitude: Option<String>,
    longitude: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegQuery {
    origin: Option<String>,
    destination: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeocodeResult {
    latitude: f64,
    longitude: f64,
    formatted_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct AddressResult {
    address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficResult {
    traffic_status: &'static str,
    estimated_duration: u64,
    distance: String,
    steps: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RouteResult {
    distance: String,
    duration: String,
    steps: Vec<String>,
    route: Vec<Coordinates>,
}

fn present(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(message))
}

fn coordinate(value: Option<String>, range: f64, name: &str) -> Result<f64, AppError> {
    let raw = present(value, "Latitude and longitude are required")?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= range)
        .ok_or_else(|| AppError::validation(format!("Invalid {name}")))
}

fn leg(query: LegQuery) -> Result<(String, String), AppError> {
    let message = "Origin and destination are required";
    Ok((
        present(query.origin, message)?,
        present(query.destination, message)?,
    ))
}

async fn geocode(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Envelope<GeocodeResult>, AppError> {
    let address = present(query.address, "Address is required")?;
    let location = state.geocoder.geocode(&address).await?;
    Ok(Envelope::ok(
        "Address geocoded",
        GeocodeResult {
            latitude: location.lat,
            longitude: location.lng,
            formatted_address: location.address,
        },
    ))
}

async fn reverse_geocode(
    State(state): State<AppState>,
    Query(query): Query<CoordinatesQuery>,
) -> Result<Envelope<AddressResult>, AppError> {
    let lat = coordinate(query.latitude, 90.0, "latitude")?;
    let lng = coordinate(query.longitude, 180.0, "longitude")?;
    let address = state.geocoder.reverse_geocode(lat, lng).await?;
    Ok(Envelope::ok("Coordinates resolved", AddressResult { address }))
}

async fn traffic(
    State(state): State<AppState>,
    Query(query): Query<LegQuery>,
) -> Result<Envelope<TrafficResult>, AppError> {
    let (origin, destination) = leg(query)?;
    let directions = state
        .geocoder
        .directions(&origin, &destination, true)
        .await?;
    Ok(Envelope::ok(
        "Traffic conditions retrieved",
        TrafficResult {
            traffic_status: directions.traffic_status(),
            estimated_duration: directions.estimated_duration_seconds(),
            distance: directions.distance,
            steps: directions.steps,
        },
    ))
}

async fn route(
    State(state): State<AppState>,
    Query(query): Query<LegQuery>,
) -> Result<Envelope<RouteResult>, AppError> {
    let (origin, destination) = leg(query)?;
    let Directions {
        distance,
        duration,
        steps,
        route,
        ..
    } = state
        .geocoder
        .directions(&origin, &destination, false)
        .await?;
    Ok(Envelope::ok(
        "Route retrieved",
        RouteResult {
            distance,
            duration,
            steps,
            route,
        },
    ))
}
