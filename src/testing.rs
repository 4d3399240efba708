use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::trip::GeoLocation,
    services::geocode::{Directions, Geocoder},
};

/// Single-connection in-memory database; more connections would each see
/// their own empty database.
pub(crate) async fn test_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    db::migrate(&pool).await.expect("migrations");
    pool
}

/// Resolves every address to the same point, except ones mentioning
/// "nowhere".
#[derive(Debug, Clone, Default)]
pub(crate) struct FixedGeocoder;

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, AppError> {
        if address.contains("nowhere") {
            return Err(AppError::Geocode("No results for the given location".into()));
        }
        Ok(GeoLocation {
            lat: 37.422,
            lng: -122.084,
            address: Some(format!("{address}, resolved")),
        })
    }

    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, AppError> {
        Ok(format!("{lat},{lng}"))
    }

    async fn directions(
        &self,
        _origin: &str,
        _destination: &str,
        with_traffic: bool,
    ) -> Result<Directions, AppError> {
        Ok(Directions {
            distance: "10 km".into(),
            distance_meters: 10_000,
            duration: "12 mins".into(),
            duration_seconds: 720,
            duration_in_traffic_seconds: with_traffic.then_some(900),
            steps: vec!["Head north".into()],
            route: Vec::new(),
        })
    }
}
