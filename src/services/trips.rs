use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{geocode::Geocoder, storage::TripStore};
use crate::{
    error::AppError,
    models::{
        sync::{NoteReplacement, RecordedTimestamps, RecordedTrip, TripPatch},
        trip::{GeoLocation, HistoryFilter, TravelMode, Trip, TripStatus},
    },
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTrip {
    pub user_id: Option<String>,
    pub start_location: Option<String>,
    pub travel_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    pub traffic_condition: Option<String>,
    pub weather_condition: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndTrip {
    pub trip_id: Option<String>,
    pub end_location: Option<String>,
    pub notes: Option<String>,
}

/// Owns every trip mutation and the ongoing -> completed transition.
#[derive(Clone)]
pub struct TripService {
    store: TripStore,
    geocoder: Arc<dyn Geocoder>,
}

impl TripService {
    pub fn new(store: TripStore, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    pub async fn start(&self, request: StartTrip) -> Result<Trip, AppError> {
        let user_id = required(request.user_id, "userId")?;
        let address = required(request.start_location, "startLocation")?;
        let travel_mode: TravelMode = required(request.travel_mode, "travelMode")?.parse()?;

        let start_location = self.geocoder.geocode(&address).await?;
        let trip = Trip::new(user_id, start_location, travel_mode);
        self.store.insert(&trip).await?;
        info!(trip_id = %trip.id, user_id = %trip.user_id, "trip started");
        Ok(trip)
    }

    pub async fn append_telemetry(
        &self,
        trip_id: &str,
        update: TelemetryUpdate,
    ) -> Result<Trip, AppError> {
        let mut trip = self.store.get(trip_id).await?;
        ensure_ongoing(&trip)?;
        trip.traffic_conditions
            .push(update.traffic_condition.unwrap_or_default());
        trip.weather_conditions
            .push(update.weather_condition.unwrap_or_default());
        self.persist(&trip).await?;
        Ok(trip)
    }

    pub async fn end(&self, request: EndTrip) -> Result<Trip, AppError> {
        let trip_id = required(request.trip_id, "tripId")?;
        let address = required(request.end_location, "endLocation")?;

        let mut trip = self.store.get(&trip_id).await?;
        ensure_ongoing(&trip)?;
        let end_location = self.geocoder.geocode(&address).await?;
        complete(&mut trip, end_location, Utc::now());
        trip.notes = request.notes;
        self.persist(&trip).await?;
        info!(trip_id = %trip.id, "trip completed");
        Ok(trip)
    }

    /// Notes are accepted in any status.
    pub async fn add_note(&self, trip_id: &str, note: &str) -> Result<Trip, AppError> {
        let mut trip = self.store.get(trip_id).await?;
        trip.append_note(note);
        self.persist(&trip).await?;
        Ok(trip)
    }

    pub async fn history(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Trip>, AppError> {
        let trips = self.store.completed_for_user(user_id.trim()).await?;
        Ok(trips.into_iter().filter(|trip| filter.matches(trip)).collect())
    }

    pub async fn details(&self, trip_id: &str) -> Result<Trip, AppError> {
        self.store.get(trip_id).await
    }

    /// Applies changes an offline client recorded for one of `user_id`'s
    /// ongoing trips. Nothing is written unless the whole patch is acceptable.
    pub async fn apply_patch(&self, user_id: &str, patch: TripPatch) -> Result<Trip, AppError> {
        let mut trip = self.store.get(&patch.trip_id).await?;
        ensure_owner(&trip, user_id)?;
        ensure_ongoing(&trip)?;

        if let Some(mode) = patch.travel_mode {
            if mode != trip.travel_mode {
                return Err(AppError::validation(
                    "Travel mode cannot change once a trip has started",
                ));
            }
        }
        let completing = patch.status == Some(TripStatus::Completed);
        if patch.end_location.is_some() && !completing {
            return Err(AppError::validation(
                "endLocation can only be set when completing a trip",
            ));
        }
        if let Some(start) = patch.start_location {
            start.validate()?;
            trip.start_location = start;
        }
        if let Some(traffic) = patch.traffic_conditions {
            trip.traffic_conditions.extend(traffic);
        }
        if let Some(weather) = patch.weather_conditions {
            trip.weather_conditions.extend(weather);
        }
        if let Some(distance) = patch.distance {
            trip.distance = Some(non_negative(distance, "distance")?);
        }
        if let Some(duration) = patch.duration {
            trip.duration = Some(non_negative(duration, "duration")?);
        }
        if let Some(notes) = patch.notes {
            trip.notes = Some(notes);
        }
        if completing {
            let end_location = patch.end_location.ok_or_else(|| {
                AppError::validation("endLocation is required to complete a trip")
            })?;
            end_location.validate()?;
            complete(&mut trip, end_location, Utc::now());
        }

        self.persist(&trip).await?;
        debug!(trip_id = %trip.id, status = %trip.status, "offline patch applied");
        Ok(trip)
    }

    /// Stores a trip that was recorded entirely on the device.
    pub async fn record(&self, user_id: &str, recorded: RecordedTrip) -> Result<Trip, AppError> {
        recorded.start_location.validate()?;
        let mut trip = Trip::new(user_id, recorded.start_location, recorded.travel_mode);

        let now = Utc::now();
        let RecordedTimestamps {
            started_at,
            ended_at,
        } = recorded.timestamps.unwrap_or_default();
        if let Some(started_at) = started_at {
            if started_at > now {
                return Err(AppError::validation("startedAt lies in the future"));
            }
            trip.timestamps.started_at = started_at;
        }
        if let Some(ended_at) = ended_at {
            if ended_at > now {
                return Err(AppError::validation("endedAt lies in the future"));
            }
            if ended_at < trip.timestamps.started_at {
                return Err(AppError::validation("endedAt lies before startedAt"));
            }
        }
        trip.traffic_conditions = recorded.traffic_conditions;
        trip.weather_conditions = recorded.weather_conditions;
        trip.distance = recorded.distance.map(|d| non_negative(d, "distance")).transpose()?;
        trip.duration = recorded.duration.map(|d| non_negative(d, "duration")).transpose()?;
        trip.notes = recorded.notes;

        match (recorded.status, recorded.end_location) {
            (Some(TripStatus::Completed), Some(end_location)) => {
                end_location.validate()?;
                complete(&mut trip, end_location, ended_at.unwrap_or(now));
            }
            (Some(TripStatus::Completed), None) => {
                return Err(AppError::validation(
                    "endLocation is required to complete a trip",
                ));
            }
            (_, Some(_)) => {
                return Err(AppError::validation(
                    "endLocation can only be set when completing a trip",
                ));
            }
            (_, None) if ended_at.is_some() => {
                return Err(AppError::validation(
                    "endedAt can only be set when completing a trip",
                ));
            }
            (_, None) => {}
        }

        self.store.insert(&trip).await?;
        debug!(trip_id = %trip.id, status = %trip.status, "offline trip recorded");
        Ok(trip)
    }

    /// Replaces the notes of one of `user_id`'s trips with the client's copy.
    /// Allowed in any status.
    pub async fn replace_notes(
        &self,
        user_id: &str,
        replacement: NoteReplacement,
    ) -> Result<Trip, AppError> {
        let mut trip = self.store.get(&replacement.trip_id).await?;
        ensure_owner(&trip, user_id)?;
        trip.notes = Some(replacement.notes).filter(|notes| !notes.is_empty());
        self.persist(&trip).await?;
        Ok(trip)
    }

    pub async fn rate(
        &self,
        trip_id: &str,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<Trip, AppError> {
        let mut trip = self.store.get(trip_id).await?;
        if !trip.is_completed() {
            return Err(AppError::InvalidState(
                "Cannot rate an incomplete trip".into(),
            ));
        }
        trip.rating = Some(rating);
        trip.feedback = feedback;
        self.persist(&trip).await?;
        Ok(trip)
    }

    async fn persist(&self, trip: &Trip) -> Result<(), AppError> {
        if self.store.save(trip).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Trip not found"))
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{field} is required")))
}

fn ensure_owner(trip: &Trip, user_id: &str) -> Result<(), AppError> {
    if trip.user_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden("You're not allowed to do that!".into()))
    }
}

fn ensure_ongoing(trip: &Trip) -> Result<(), AppError> {
    if trip.is_ongoing() {
        Ok(())
    } else {
        Err(AppError::InvalidState("Trip already completed".into()))
    }
}

fn non_negative(value: f64, field: &str) -> Result<f64, AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{field} must be a non-negative number")))
    }
}

/// The only place a trip becomes completed; end location and end time are
/// set together.
fn complete(trip: &mut Trip, end_location: GeoLocation, ended_at: DateTime<Utc>) {
    trip.end_location = Some(end_location);
    trip.status = TripStatus::Completed;
    trip.timestamps.ended_at = Some(ended_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_pool, FixedGeocoder};
    use chrono::Duration;

    async fn service() -> TripService {
        let store = TripStore::new(test_pool().await);
        TripService::new(store, Arc::new(FixedGeocoder::default()))
    }

    fn start_request(address: &str) -> StartTrip {
        StartTrip {
            user_id: Some("u1".into()),
            start_location: Some(address.into()),
            travel_mode: Some("car".into()),
        }
    }

    fn point(lat: f64, lng: f64) -> GeoLocation {
        GeoLocation {
            lat,
            lng,
            address: None,
        }
    }

    #[tokio::test]
    async fn start_resolves_address_and_begins_ongoing() {
        let trips = service().await;
        let trip = trips
            .start(start_request("1600 Amphitheatre Parkway"))
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Ongoing);
        assert!(trip.start_location.address.is_some());
        assert!(trip.end_location.is_none());
        assert_eq!(trips.details(&trip.id).await.unwrap(), trip);
    }

    #[tokio::test]
    async fn start_requires_every_field() {
        let trips = service().await;
        let mut request = start_request("somewhere");
        request.travel_mode = Some("  ".into());
        assert!(matches!(
            trips.start(request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn start_reports_unresolvable_address() {
        let trips = service().await;
        assert!(matches!(
            trips.start(start_request("nowhere at all")).await,
            Err(AppError::Geocode(_))
        ));
    }

    #[tokio::test]
    async fn telemetry_appends_even_blank_values() {
        let trips = service().await;
        let trip = trips.start(start_request("somewhere")).await.unwrap();
        let updated = trips
            .append_telemetry(
                &trip.id,
                TelemetryUpdate {
                    traffic_condition: Some("heavy".into()),
                    weather_condition: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.traffic_conditions, vec!["heavy".to_string()]);
        assert_eq!(updated.weather_conditions, vec![String::new()]);
    }

    #[tokio::test]
    async fn ending_twice_is_rejected_and_keeps_end_time() {
        let trips = service().await;
        let trip = trips.start(start_request("somewhere")).await.unwrap();
        let ended = trips
            .end(EndTrip {
                trip_id: Some(trip.id.clone()),
                end_location: Some("elsewhere".into()),
                notes: Some("ok".into()),
            })
            .await
            .unwrap();
        assert_eq!(ended.status, TripStatus::Completed);

        let second = trips
            .end(EndTrip {
                trip_id: Some(trip.id.clone()),
                end_location: Some("elsewhere".into()),
                notes: None,
            })
            .await;
        assert!(matches!(second, Err(AppError::InvalidState(_))));
        let stored = trips.details(&trip.id).await.unwrap();
        assert_eq!(stored.timestamps.ended_at, ended.timestamps.ended_at);
        assert_eq!(stored.notes.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn telemetry_on_completed_trip_is_invalid_state() {
        let trips = service().await;
        let trip = trips
            .record(
                "u1",
                RecordedTrip {
                    start_location: point(1.0, 1.0),
                    end_location: Some(point(2.0, 2.0)),
                    travel_mode: TravelMode::Bicycle,
                    traffic_conditions: Vec::new(),
                    weather_conditions: Vec::new(),
                    distance: Some(3.5),
                    duration: None,
                    notes: None,
                    status: Some(TripStatus::Completed),
                    timestamps: Some(RecordedTimestamps::default()),
                },
            )
            .await
            .unwrap();
        let result = trips
            .append_telemetry(&trip.id, TelemetryUpdate::default())
            .await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let trips = service().await;
        assert!(matches!(
            trips.details("not-a-uuid").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            trips.add_note("not-a-uuid", "x").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn patch_cannot_change_travel_mode() {
        let trips = service().await;
        let trip = trips.start(start_request("somewhere")).await.unwrap();
        let result = trips
            .apply_patch(
                "u1",
                TripPatch {
                    trip_id: trip.id.clone(),
                    travel_mode: Some(TravelMode::Bicycle),
                    distance: Some(4.0),
                    ..TripPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(trips.details(&trip.id).await.unwrap().distance, None);
    }

    #[tokio::test]
    async fn patch_can_complete_with_end_location() {
        let trips = service().await;
        let trip = trips.start(start_request("somewhere")).await.unwrap();
        let done = trips
            .apply_patch(
                "u1",
                TripPatch {
                    trip_id: trip.id.clone(),
                    end_location: Some(point(3.0, 4.0)),
                    status: Some(TripStatus::Completed),
                    traffic_conditions: Some(vec!["light".into()]),
                    ..TripPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(done.is_completed());
        assert!(done.timestamps.ended_at.is_some());
        assert_eq!(done.end_location, Some(point(3.0, 4.0)));
    }

    #[tokio::test]
    async fn history_lists_completed_trips_newest_first() {
        let trips = service().await;
        let open = trips.start(start_request("somewhere")).await.unwrap();
        let mut ended = Vec::new();
        for _ in 0..2 {
            let trip = trips.start(start_request("somewhere")).await.unwrap();
            ended.push(
                trips
                    .end(EndTrip {
                        trip_id: Some(trip.id),
                        end_location: Some("elsewhere".into()),
                        notes: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        let history = trips.history("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|t| t.id != open.id));
        assert!(history[0].timestamps.ended_at >= history[1].timestamps.ended_at);
    }

    #[tokio::test]
    async fn offline_writes_to_another_users_trip_are_forbidden() {
        let trips = service().await;
        let trip = trips.start(start_request("somewhere")).await.unwrap();

        let patched = trips
            .apply_patch(
                "u2",
                TripPatch {
                    trip_id: trip.id.clone(),
                    end_location: Some(point(3.0, 4.0)),
                    status: Some(TripStatus::Completed),
                    ..TripPatch::default()
                },
            )
            .await;
        assert!(matches!(patched, Err(AppError::Forbidden(_))));

        let noted = trips
            .replace_notes(
                "u2",
                NoteReplacement {
                    trip_id: trip.id.clone(),
                    notes: "overwritten".into(),
                },
            )
            .await;
        assert!(matches!(noted, Err(AppError::Forbidden(_))));

        let stored = trips.details(&trip.id).await.unwrap();
        assert!(stored.is_ongoing());
        assert_eq!(stored.notes, None);
    }

    fn recorded(started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> RecordedTrip {
        RecordedTrip {
            start_location: point(1.0, 1.0),
            end_location: Some(point(2.0, 2.0)),
            travel_mode: TravelMode::Car,
            traffic_conditions: Vec::new(),
            weather_conditions: Vec::new(),
            distance: None,
            duration: None,
            notes: None,
            status: Some(TripStatus::Completed),
            timestamps: Some(RecordedTimestamps {
                started_at: Some(started_at),
                ended_at,
            }),
        }
    }

    #[tokio::test]
    async fn recorded_trip_keeps_device_end_time() {
        let trips = service().await;
        let started = Utc::now() - Duration::days(3);
        let ended = started + Duration::minutes(40);
        let trip = trips.record("u1", recorded(started, Some(ended))).await.unwrap();
        assert_eq!(trip.timestamps.started_at, started);
        assert_eq!(trip.timestamps.ended_at, Some(ended));
    }

    #[tokio::test]
    async fn recorded_end_time_must_follow_start_and_not_be_in_the_future() {
        let trips = service().await;
        let started = Utc::now() - Duration::hours(2);
        let before_start = trips
            .record("u1", recorded(started, Some(started - Duration::minutes(1))))
            .await;
        assert!(matches!(before_start, Err(AppError::Validation(_))));

        let future = trips
            .record("u1", recorded(started, Some(Utc::now() + Duration::hours(1))))
            .await;
        assert!(matches!(future, Err(AppError::Validation(_))));
    }
}
