use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{error::AppError, models::trip::GeoLocation};

const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const DIRECTIONS_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Directions {
    pub distance: String,
    pub distance_meters: u64,
    pub duration: String,
    pub duration_seconds: u64,
    pub duration_in_traffic_seconds: Option<u64>,
    pub steps: Vec<String>,
    pub route: Vec<Coordinates>,
}

impl Directions {
    /// Coarse traffic level from the ratio of in-traffic to free-flow time.
    pub fn traffic_status(&self) -> &'static str {
        let Some(in_traffic) = self.duration_in_traffic_seconds else {
            return "Unknown";
        };
        if self.duration_seconds == 0 {
            return "Unknown";
        }
        let ratio = in_traffic as f64 / self.duration_seconds as f64;
        if ratio < 1.1 {
            "Light"
        } else if ratio < 1.4 {
            "Moderate"
        } else {
            "Heavy"
        }
    }

    pub fn estimated_duration_seconds(&self) -> u64 {
        self.duration_in_traffic_seconds
            .unwrap_or(self.duration_seconds)
    }
}

/// Address resolution and routing.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, AppError>;

    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, AppError>;

    async fn directions(
        &self,
        origin: &str,
        destination: &str,
        with_traffic: bool,
    ) -> Result<Directions, AppError>;
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredGeocoder;

fn not_configured() -> AppError {
    AppError::Geocode("Geocoding service is not configured".into())
}

#[async_trait]
impl Geocoder for UnconfiguredGeocoder {
    async fn geocode(&self, _address: &str) -> Result<GeoLocation, AppError> {
        Err(not_configured())
    }

    async fn reverse_geocode(&self, _lat: f64, _lng: f64) -> Result<String, AppError> {
        Err(not_configured())
    }

    async fn directions(
        &self,
        _origin: &str,
        _destination: &str,
        _with_traffic: bool,
    ) -> Result<Directions, AppError> {
        Err(not_configured())
    }
}

#[derive(Clone)]
pub struct GoogleMapsGeocoder {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleMapsGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    async fn fetch<T>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<T, AppError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("key", self.api_key.clone()));
        let url = Url::parse_with_params(endpoint, &query)
            .map_err(|err| AppError::Other(err.into()))?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<Route>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Route {
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: TextValue,
    duration: TextValue,
    duration_in_traffic: Option<TextValue>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct Step {
    html_instructions: String,
    start_location: LatLng,
}

fn upstream_failure(status: &str, message: Option<String>) -> AppError {
    warn!("google maps answered {status}: {message:?}");
    match status {
        "ZERO_RESULTS" | "NOT_FOUND" => AppError::Geocode("No results for the given location".into()),
        _ => AppError::Geocode(message.unwrap_or_else(|| format!("Geocoding failed: {status}"))),
    }
}

#[async_trait]
impl Geocoder for GoogleMapsGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, AppError> {
        debug!("geocoding {address:?}");
        let response: GeocodeResponse = self
            .fetch(GEOCODE_ENDPOINT, &[("address", address.to_string())])
            .await?;
        if response.status != "OK" {
            return Err(upstream_failure(&response.status, response.error_message));
        }
        let first = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Geocode("No results for the given location".into()))?;
        Ok(GeoLocation {
            lat: first.geometry.location.lat,
            lng: first.geometry.location.lng,
            address: Some(first.formatted_address),
        })
    }

    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, AppError> {
        let response: GeocodeResponse = self
            .fetch(GEOCODE_ENDPOINT, &[("latlng", format!("{lat},{lng}"))])
            .await?;
        if response.status != "OK" {
            return Err(upstream_failure(&response.status, response.error_message));
        }
        response
            .results
            .into_iter()
            .next()
            .map(|result| result.formatted_address)
            .ok_or_else(|| AppError::Geocode("No results for the given location".into()))
    }

    async fn directions(
        &self,
        origin: &str,
        destination: &str,
        with_traffic: bool,
    ) -> Result<Directions, AppError> {
        let mut params = vec![
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
        ];
        if with_traffic {
            params.push(("departure_time", "now".to_string()));
        }
        let response: DirectionsResponse = self.fetch(DIRECTIONS_ENDPOINT, &params).await?;
        if response.status != "OK" {
            return Err(upstream_failure(&response.status, response.error_message));
        }
        let leg = response
            .routes
            .into_iter()
            .next()
            .and_then(|route| route.legs.into_iter().next())
            .ok_or_else(|| AppError::Geocode("No route between the given locations".into()))?;
        Ok(Directions {
            distance: leg.distance.text,
            distance_meters: leg.distance.value,
            duration: leg.duration.text,
            duration_seconds: leg.duration.value,
            duration_in_traffic_seconds: leg.duration_in_traffic.map(|d| d.value),
            route: leg
                .steps
                .iter()
                .map(|step| Coordinates {
                    latitude: step.start_location.lat,
                    longitude: step.start_location.lng,
                })
                .collect(),
            steps: leg
                .steps
                .iter()
                .map(|step| strip_tags(&step.html_instructions))
                .collect(),
        })
    }
}

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new("<[^>]+>").expect("tag pattern");
}

fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}
