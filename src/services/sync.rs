use tracing::{debug, error, info};

use super::trips::TripService;
use crate::{
    error::AppError,
    models::{
        sync::{SyncItem, SyncOperation, SyncOutcome, SyncReport, SyncRequest, SyncStatus},
        trip::Trip,
    },
};

/// Replays offline batches through the lifecycle manager.
#[derive(Clone)]
pub struct SyncService {
    trips: TripService,
}

impl SyncService {
    pub fn new(trips: TripService) -> Self {
        Self { trips }
    }

    /// Processes items strictly in order, one at a time. A failing item is
    /// reported and the batch moves on; nothing is rolled back.
    pub async fn reconcile(&self, request: SyncRequest) -> Result<SyncReport, AppError> {
        let user_id = request
            .user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let items = request.offline_data.filter(|items| !items.is_empty());
        let (Some(user_id), Some(items)) = (user_id, items) else {
            return Err(AppError::validation(
                "User ID and offline data are required.",
            ));
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let outcome = self.process(&user_id, index, item).await;
            results.push(outcome);
        }

        let failed = results
            .iter()
            .filter(|outcome| outcome.status == SyncStatus::Failed)
            .count();
        info!(%user_id, total = results.len(), failed, "offline batch reconciled");
        Ok(SyncReport { results })
    }

    async fn process(&self, user_id: &str, index: usize, item: &SyncItem) -> SyncOutcome {
        let operation = match SyncOperation::decode(item) {
            Ok(operation) => operation,
            Err(rejection) => {
                debug!(index, kind = %item.kind, action = %item.action, "sync item rejected: {rejection}");
                return SyncOutcome::failed(item, rejection.to_string());
            }
        };
        match self.apply(user_id, operation).await {
            Ok(trip) => SyncOutcome::success(item, trip),
            Err(err) => {
                if err.status().is_server_error() {
                    error!(index, kind = %item.kind, action = %item.action, "sync item failed: {err:?}");
                } else {
                    debug!(index, kind = %item.kind, action = %item.action, "sync item failed: {err}");
                }
                SyncOutcome::failed(item, err.public_message())
            }
        }
    }

    async fn apply(&self, user_id: &str, operation: SyncOperation) -> Result<Trip, AppError> {
        match operation {
            SyncOperation::UpdateTrip(patch) => self.trips.apply_patch(user_id, patch).await,
            SyncOperation::CreateTrip(recorded) => self.trips.record(user_id, recorded).await,
            SyncOperation::AddNote(replacement) => self.trips.replace_notes(user_id, replacement).await,
        }
    }
}
