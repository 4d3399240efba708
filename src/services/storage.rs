use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{Trip, TripRow, TripStatus},
};

const TRIP_COLUMNS: &str = "id, user_id, start_lat, start_lng, start_address, end_lat, end_lng, \
     end_address, travel_mode, traffic_conditions, weather_conditions, distance, duration, notes, \
     status, started_at, ended_at, rating, feedback";

/// Persistence for trip records. Every write replaces one whole row, so two
/// concurrent writers to the same trip resolve as last-write-wins.
#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
}

impl TripStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn insert(&self, trip: &Trip) -> Result<(), AppError> {
        let end = trip.end_location.as_ref();
        sqlx::query(
            r#"INSERT INTO trips (id, user_id, start_lat, start_lng, start_address, end_lat, end_lng,
                end_address, travel_mode, traffic_conditions, weather_conditions, distance, duration,
                notes, status, started_at, ended_at, rating, feedback)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"#,
        )
        .bind(&trip.id)
        .bind(&trip.user_id)
        .bind(trip.start_location.lat)
        .bind(trip.start_location.lng)
        .bind(&trip.start_location.address)
        .bind(end.map(|loc| loc.lat))
        .bind(end.map(|loc| loc.lng))
        .bind(end.and_then(|loc| loc.address.clone()))
        .bind(trip.travel_mode)
        .bind(Json(&trip.traffic_conditions))
        .bind(Json(&trip.weather_conditions))
        .bind(trip.distance)
        .bind(trip.duration)
        .bind(&trip.notes)
        .bind(trip.status)
        .bind(trip.timestamps.started_at)
        .bind(trip.timestamps.ended_at)
        .bind(trip.rating.map(i64::from))
        .bind(&trip.feedback)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Writes every mutable field of `trip`. Returns `false` when the row
    /// no longer exists.
    pub async fn save(&self, trip: &Trip) -> Result<bool, AppError> {
        let end = trip.end_location.as_ref();
        let result = sqlx::query(
            r#"UPDATE trips SET start_lat = ?2, start_lng = ?3, start_address = ?4, end_lat = ?5,
                end_lng = ?6, end_address = ?7, traffic_conditions = ?8, weather_conditions = ?9,
                distance = ?10, duration = ?11, notes = ?12, status = ?13, ended_at = ?14,
                rating = ?15, feedback = ?16
               WHERE id = ?1"#,
        )
        .bind(&trip.id)
        .bind(trip.start_location.lat)
        .bind(trip.start_location.lng)
        .bind(&trip.start_location.address)
        .bind(end.map(|loc| loc.lat))
        .bind(end.map(|loc| loc.lng))
        .bind(end.and_then(|loc| loc.address.clone()))
        .bind(Json(&trip.traffic_conditions))
        .bind(Json(&trip.weather_conditions))
        .bind(trip.distance)
        .bind(trip.duration)
        .bind(&trip.notes)
        .bind(trip.status)
        .bind(trip.timestamps.ended_at)
        .bind(trip.rating.map(i64::from))
        .bind(&trip.feedback)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Looks a trip up by id. Identifiers that are not UUIDs cannot name a
    /// trip and resolve to `None`.
    pub async fn find(&self, trip_id: &str) -> Result<Option<Trip>, AppError> {
        if Uuid::parse_str(trip_id.trim()).is_err() {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"
        ))
        .bind(trip_id.trim())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Trip::from))
    }

    pub async fn get(&self, trip_id: &str) -> Result<Trip, AppError> {
        self.find(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found("Trip not found"))
    }

    /// Completed trips of a user, most recently ended first.
    pub async fn completed_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ?1 AND status = ?2"
        ))
        .bind(user_id)
        .bind(TripStatus::Completed)
        .fetch_all(&self.db)
        .await?;
        let mut trips: Vec<Trip> = rows.into_iter().map(Trip::from).collect();
        trips.sort_by(|a, b| b.timestamps.ended_at.cmp(&a.timestamps.ended_at));
        Ok(trips)
    }

    pub async fn ratings_for_user(&self, user_id: &str) -> Result<Vec<i64>, AppError> {
        let ratings = sqlx::query_scalar::<_, i64>(
            "SELECT rating FROM trips WHERE user_id = ?1 AND rating IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(ratings)
    }
}
