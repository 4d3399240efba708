use serde::{Deserialize, Serialize, Serializer};

use super::{storage::TripStore, trips::TripService};
use crate::{error::AppError, models::trip::Trip};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmission {
    pub trip_id: Option<String>,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRating {
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRating {
    #[serde(serialize_with = "two_decimals")]
    pub average_rating: f64,
    pub total_ratings: usize,
}

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

/// Mean rounded half away from zero to two decimals. `None` for no ratings.
pub fn mean_rating(ratings: &[i64]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().sum();
    let mean = sum as f64 / ratings.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

#[derive(Clone)]
pub struct RatingService {
    trips: TripService,
    store: TripStore,
}

impl RatingService {
    pub fn new(trips: TripService, store: TripStore) -> Self {
        Self { trips, store }
    }

    pub async fn submit(&self, submission: RatingSubmission) -> Result<Trip, AppError> {
        let trip_id = submission
            .trip_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let (Some(trip_id), Some(rating)) = (trip_id, submission.rating) else {
            return Err(AppError::validation("Trip ID and rating are required."));
        };
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| AppError::validation("Rating must be between 1 and 5."))?;
        self.trips.rate(&trip_id, rating, submission.feedback).await
    }

    pub async fn for_trip(&self, trip_id: &str) -> Result<TripRating, AppError> {
        let trip = self.store.get(trip_id).await?;
        Ok(TripRating {
            rating: trip.rating,
            feedback: trip.feedback,
        })
    }

    pub async fn user_average(&self, user_id: &str) -> Result<AverageRating, AppError> {
        let ratings = self.store.ratings_for_user(user_id.trim()).await?;
        let average_rating = mean_rating(&ratings)
            .ok_or_else(|| AppError::not_found("No ratings found for the user."))?;
        Ok(AverageRating {
            average_rating,
            total_ratings: ratings.len(),
        })
    }
}
