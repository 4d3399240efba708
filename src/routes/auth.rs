use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::{
    auth::AuthenticatedUser,
    envelope::Envelope,
    error::AppError,
    models::session::TokenKind,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessToken {
    access_token: String,
}

/// Revokes the presented access token, and the refresh token too when the
/// body carries one.
async fn logout(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    body: Option<ApiJson<RefreshRequest>>,
) -> Result<Envelope<()>, AppError> {
    state.tokens.revoke(&current.claims).await?;
    let refresh = body.and_then(|ApiJson(request)| request.refresh_token);
    if let Some(token) = refresh.filter(|t| !t.trim().is_empty()) {
        let claims = state.tokens.verify(token.trim(), TokenKind::Refresh).await?;
        if claims.user.id != current.id {
            return Err(AppError::Forbidden("You're not allowed to do that!".into()));
        }
        state.tokens.revoke(&claims).await?;
    }
    Ok(Envelope::message("Logged out successfully"))
}

async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Envelope<AccessToken>, AppError> {
    let token = request
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized("Refresh token is required".into()))?;
    let claims = state.tokens.verify(token.trim(), TokenKind::Refresh).await?;
    // The role may have changed since the refresh token was issued.
    let user = state.users.get(&claims.user.id).await?;
    let access_token = state.tokens.issue(&user, TokenKind::Access)?;
    Ok(Envelope::ok("Token refreshed", AccessToken { access_token }))
}
