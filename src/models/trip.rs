use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    Motorcycle,
    Bicycle,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Motorcycle => "motorcycle",
            TravelMode::Bicycle => "bicycle",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TravelMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(TravelMode::Car),
            "motorcycle" => Ok(TravelMode::Motorcycle),
            "bicycle" => Ok(TravelMode::Bicycle),
            other => Err(AppError::validation(format!(
                "Invalid travel mode: {other} (expected car, motorcycle or bicycle)"
            ))),
        }
    }
}

/// Lifecycle status. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TripStatus {
    Ongoing,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Ongoing => "ongoing",
            TripStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

impl GeoLocation {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::validation(format!(
                "Coordinates out of range: {}, {}",
                self.lat, self.lng
            )));
        }
        Ok(())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripTimestamps {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub start_location: GeoLocation,
    pub end_location: Option<GeoLocation>,
    pub travel_mode: TravelMode,
    pub traffic_conditions: Vec<String>,
    pub weather_conditions: Vec<String>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub status: TripStatus,
    pub timestamps: TripTimestamps,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

impl Trip {
    pub fn new(
        user_id: impl Into<String>,
        start_location: GeoLocation,
        travel_mode: TravelMode,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            start_location,
            end_location: None,
            travel_mode,
            traffic_conditions: Vec::new(),
            weather_conditions: Vec::new(),
            distance: None,
            duration: None,
            notes: None,
            status: TripStatus::Ongoing,
            timestamps: TripTimestamps {
                started_at: Utc::now(),
                ended_at: None,
            },
            rating: None,
            feedback: None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == TripStatus::Ongoing
    }

    pub fn is_completed(&self) -> bool {
        self.status == TripStatus::Completed
    }

    pub fn append_note(&mut self, note: &str) {
        if note.trim().is_empty() {
            return;
        }
        self.notes = match self.notes.take() {
            Some(existing) if !existing.is_empty() => Some(format!("{existing}\n{note}")),
            _ => Some(note.to_string()),
        };
    }
}

/// Flat database shape of a [`Trip`].
#[derive(Debug, FromRow)]
pub struct TripRow {
    pub id: String,
    pub user_id: String,
    pub start_lat: f64,
    pub start_lng: f64,
    pub start_address: Option<String>,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    pub end_address: Option<String>,
    pub travel_mode: TravelMode,
    pub traffic_conditions: Json<Vec<String>>,
    pub weather_conditions: Json<Vec<String>>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub status: TripStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        let end_location = match (row.end_lat, row.end_lng) {
            (Some(lat), Some(lng)) => Some(GeoLocation {
                lat,
                lng,
                address: row.end_address,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            start_location: GeoLocation {
                lat: row.start_lat,
                lng: row.start_lng,
                address: row.start_address,
            },
            end_location,
            travel_mode: row.travel_mode,
            traffic_conditions: row.traffic_conditions.0,
            weather_conditions: row.weather_conditions.0,
            distance: row.distance,
            duration: row.duration,
            notes: row.notes,
            status: row.status,
            timestamps: TripTimestamps {
                started_at: row.started_at,
                ended_at: row.ended_at,
            },
            rating: row.rating.and_then(|value| u8::try_from(value).ok()),
            feedback: row.feedback,
        }
    }
}

/// Raw query string of the history filter endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub travel_mode: Option<String>,
    pub traffic_condition: Option<String>,
}

/// Narrows a user's completed trips. Date bounds apply to `endedAt`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub ended_from: Option<DateTime<Utc>>,
    pub ended_until: Option<DateTime<Utc>>,
    pub travel_mode: Option<TravelMode>,
    pub traffic_condition: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        let ended_at = trip.timestamps.ended_at;
        if let Some(from) = self.ended_from {
            if ended_at.map_or(true, |ended| ended < from) {
                return false;
            }
        }
        if let Some(until) = self.ended_until {
            if ended_at.map_or(true, |ended| ended > until) {
                return false;
            }
        }
        if let Some(mode) = self.travel_mode {
            if trip.travel_mode != mode {
                return false;
            }
        }
        if let Some(condition) = &self.traffic_condition {
            if !trip.traffic_conditions.iter().any(|c| c == condition) {
                return false;
            }
        }
        true
    }
}

impl TryFrom<HistoryQuery> for HistoryFilter {
    type Error = AppError;

    fn try_from(query: HistoryQuery) -> Result<Self, Self::Error> {
        let ended_from = non_blank(query.start_date)
            .map(|raw| parse_date_bound(&raw, NaiveTime::MIN))
            .transpose()?;
        let ended_until = non_blank(query.end_date)
            .map(|raw| parse_date_bound(&raw, end_of_day()))
            .transpose()?;
        let travel_mode = non_blank(query.travel_mode)
            .map(|raw| raw.parse::<TravelMode>())
            .transpose()?;
        Ok(Self {
            ended_from,
            ended_until,
            travel_mode,
            traffic_condition: non_blank(query.traffic_condition),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`, which is pinned to `time_of_day`.
fn parse_date_bound(raw: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|day| day.and_time(time_of_day).and_utc())
        .map_err(|_| AppError::validation(format!("Invalid date: {raw}")))
}
