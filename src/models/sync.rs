use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::trip::{GeoLocation, TravelMode, Trip, TripStatus};

/// One client-buffered mutation as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub user_id: Option<String>,
    pub offline_data: Option<Vec<SyncItem>>,
}

/// Field-level changes an offline client recorded for an existing trip.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPatch {
    pub trip_id: String,
    pub start_location: Option<GeoLocation>,
    pub end_location: Option<GeoLocation>,
    pub travel_mode: Option<TravelMode>,
    pub traffic_conditions: Option<Vec<String>>,
    pub weather_conditions: Option<Vec<String>>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<TripStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedTimestamps {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A whole trip recorded while offline. Coordinates come from the device,
/// so no address resolution happens on replay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedTrip {
    pub start_location: GeoLocation,
    pub end_location: Option<GeoLocation>,
    pub travel_mode: TravelMode,
    #[serde(default)]
    pub traffic_conditions: Vec<String>,
    #[serde(default)]
    pub weather_conditions: Vec<String>,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<TripStatus>,
    pub timestamps: Option<RecordedTimestamps>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteReplacement {
    pub trip_id: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    UpdateTrip(TripPatch),
    CreateTrip(RecordedTrip),
    AddNote(NoteReplacement),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRejection {
    UnsupportedType(String),
    UnsupportedAction(String),
    InvalidData(String),
}

impl fmt::Display for SyncRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncRejection::UnsupportedType(kind) => write!(f, "Unsupported type: {kind}"),
            SyncRejection::UnsupportedAction(action) => write!(f, "Unsupported action: {action}"),
            SyncRejection::InvalidData(reason) => write!(f, "Invalid data: {reason}"),
        }
    }
}

impl SyncOperation {
    pub fn decode(item: &SyncItem) -> Result<Self, SyncRejection> {
        match (item.kind.as_str(), item.action.as_str()) {
            ("trip", "update") => decode_data(&item.data).map(SyncOperation::UpdateTrip),
            ("trip", "create") => decode_data(&item.data).map(SyncOperation::CreateTrip),
            ("note", "addNote") => decode_data(&item.data).map(SyncOperation::AddNote),
            ("trip" | "note", action) => Err(SyncRejection::UnsupportedAction(action.to_string())),
            (kind, _) => Err(SyncRejection::UnsupportedType(kind.to_string())),
        }
    }
}

fn decode_data<T: DeserializeOwned>(data: &Value) -> Result<T, SyncRejection> {
    serde_json::from_value(data.clone()).map_err(|err| SyncRejection::InvalidData(err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
}

/// Per-item report entry, in submission order.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    pub status: SyncStatus,
    pub data: Option<Trip>,
    pub msg: Option<String>,
}

impl SyncOutcome {
    pub fn success(item: &SyncItem, trip: Trip) -> Self {
        Self {
            kind: item.kind.clone(),
            action: item.action.clone(),
            status: SyncStatus::Success,
            data: Some(trip),
            msg: None,
        }
    }

    pub fn failed(item: &SyncItem, msg: impl Into<String>) -> Self {
        Self {
            kind: item.kind.clone(),
            action: item.action.clone(),
            status: SyncStatus::Failed,
            data: None,
            msg: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub results: Vec<SyncOutcome>,
}
