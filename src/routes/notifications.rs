use axum::{
    extract::{Path, Query, State},
    routing::{patch, post},
    Router,
};
use serde::Deserialize;

use super::ApiJson;
use crate::{
    auth::AuthenticatedUser,
    envelope::Envelope,
    error::AppError,
    models::notification::Notification,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_notification).get(list_notifications))
        .route("/:id", patch(mark_read).delete(delete_notification))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewNotification {
    user_id: Option<String>,
    title: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: Option<String>,
}

async fn create_notification(
    State(state): State<AppState>,
    _current: AuthenticatedUser,
    ApiJson(request): ApiJson<NewNotification>,
) -> Result<Envelope<Notification>, AppError> {
    let notification = state
        .notifications
        .create(request.user_id, request.title, request.message)
        .await?;
    Ok(Envelope::created("Notification created", notification))
}

/// Defaults to the caller's own notifications.
async fn list_notifications(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Envelope<Vec<Notification>>, AppError> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| current.id.clone());
    current.require_self(&user_id)?;
    let notifications = state.notifications.for_user(&user_id).await?;
    Ok(Envelope::ok("Notifications retrieved", notifications))
}

/// Only the recipient or an admin may touch an existing notification.
async fn ensure_recipient(
    state: &AppState,
    current: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    if let Some(notification) = state.notifications.find(id).await? {
        current.require_self(&notification.user_id)?;
    }
    Ok(())
}

async fn mark_read(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Envelope<Notification>, AppError> {
    ensure_recipient(&state, &current, &id).await?;
    let notification = state.notifications.mark_read(&id).await?;
    Ok(Envelope::ok("Notification marked as read", notification))
}

async fn delete_notification(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Envelope<()>, AppError> {
    ensure_recipient(&state, &current, &id).await?;
    state.notifications.delete(&id).await?;
    Ok(Envelope::message("Notification deleted"))
}
