use axum::{extract::State, routing::post, Router};

use super::ApiJson;
use crate::{
    auth::AuthenticatedUser,
    envelope::Envelope,
    error::AppError,
    models::sync::{SyncReport, SyncRequest},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(sync_offline_data))
}

async fn sync_offline_data(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    ApiJson(request): ApiJson<SyncRequest>,
) -> Result<Envelope<SyncReport>, AppError> {
    if let Some(user_id) = request.user_id.as_deref().map(str::trim) {
        if !user_id.is_empty() {
            current.require_self(user_id)?;
        }
    }
    let report = state.sync.reconcile(request).await?;
    Ok(Envelope::ok("Data synchronized successfully", report))
}
