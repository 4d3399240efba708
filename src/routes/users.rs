use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiJson;
use crate::{
    auth::{self, AuthenticatedUser},
    envelope::Envelope,
    error::AppError,
    models::user::{ProfileUpdate, User},
    services::{messaging, otp::normalize_phone},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/profile/:id", put(update_profile))
        .route("/find/:id", get(find_user))
        .route("/reset-password", post(reset_password))
        .route("/change-password/:id", post(change_password))
        .route("/otp/send", post(send_otp))
        .route("/otp/verify", post(verify_otp))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    refresh_token: String,
    user: User,
}

fn session(state: &AppState, user: User) -> Result<SessionResponse, AppError> {
    let pair = state.tokens.issue_pair(&user)?;
    Ok(SessionResponse {
        token: pair.token,
        refresh_token: pair.refresh_token,
        user,
    })
}

async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Envelope<SessionResponse>, AppError> {
    let user =
        auth::register_user(&state, &request.name, &request.email, &request.password).await?;
    Ok(Envelope::created(
        "User registered successfully",
        session(&state, user)?,
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Envelope<SessionResponse>, AppError> {
    let user = auth::authenticate_user(&state, &request.email, &request.password).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Envelope::ok("Login successful", session(&state, user)?))
}

async fn profile(
    State(state): State<AppState>,
    current: AuthenticatedUser,
) -> Result<Envelope<User>, AppError> {
    let user = state.users.get(&current.id).await?;
    Ok(Envelope::ok("User profile retrieved", user))
}

async fn find_user(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Envelope<User>, AppError> {
    current.require_admin()?;
    let user = state.users.get(&id).await?;
    Ok(Envelope::ok("User found", user))
}

async fn update_profile(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Envelope<User>, AppError> {
    current.require_self(&id)?;
    let mut user = state.users.get(&id).await?;
    apply_profile_update(&mut user, update)?;
    let saved = state.users.save(&user).await?;
    Ok(Envelope::ok("Profile updated", saved))
}

/// Blank strings leave a field untouched. Location is set as a pair.
fn apply_profile_update(user: &mut User, update: ProfileUpdate) -> Result<(), AppError> {
    let filled = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    if let Some(name) = filled(update.name) {
        user.name = name;
    }
    if let Some(phone) = filled(update.phone_number) {
        user.phone_number = Some(normalize_phone(&phone));
    }
    if let Some(vehicle) = filled(update.vehicle_type) {
        user.vehicle_type = Some(vehicle);
    }
    match (update.latitude, update.longitude) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(AppError::validation("Location is out of range"));
            }
            user.latitude = Some(lat);
            user.longitude = Some(lng);
        }
        (None, None) => {}
        _ => {
            return Err(AppError::validation(
                "Latitude and longitude must be provided together",
            ))
        }
    }
    if let Some(password) = update.password.filter(|p| !p.is_empty()) {
        let current_ok = match (update.current_password, user.password_hash.as_deref()) {
            (Some(given), Some(hash)) => auth::verify_password(&given, hash),
            _ => false,
        };
        if !current_ok {
            return Err(AppError::validation("Current password is incorrect"));
        }
        auth::validate_password(&password)?;
        user.password_hash = Some(auth::hash_password(&password)?);
    }
    Ok(())
}

async fn reset_password(
    State(state): State<AppState>,
    current: AuthenticatedUser,
) -> Result<Envelope<()>, AppError> {
    let user = state.users.get(&current.id).await?;
    let link = messaging::password_reset_link(&state.config.client_url, &user.id, &user.email)?;
    let mail = messaging::password_reset_mail(
        &state.config.mail_sender,
        &user.email,
        &user.name,
        &link,
    )?;
    state.mailer.send(&mail).await?;
    Ok(Envelope::message("Password reset link sent"))
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    #[serde(default)]
    password: String,
}

async fn change_password(
    State(state): State<AppState>,
    current: AuthenticatedUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Envelope<()>, AppError> {
    current.require_self(&id)?;
    auth::validate_password(&request.password)?;
    let mut user = state.users.get(&id).await?;
    user.password_hash = Some(auth::hash_password(&request.password)?);
    state.users.save(&user).await?;
    info!(user_id = %id, "password changed");
    Ok(Envelope::message("Password changed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpSendRequest {
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpVerifyRequest {
    phone_number: Option<String>,
    code: Option<String>,
}

async fn user_for_phone(state: &AppState, phone_number: Option<String>) -> Result<User, AppError> {
    let phone = phone_number
        .map(|p| normalize_phone(&p))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("Phone number is required"))?;
    state
        .users
        .find_by_phone(&phone)
        .await?
        .ok_or_else(|| AppError::not_found("No user with this phone number"))
}

async fn send_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OtpSendRequest>,
) -> Result<Envelope<()>, AppError> {
    let user = user_for_phone(&state, request.phone_number).await?;
    let Some(phone) = user.phone_number.as_deref() else {
        return Err(AppError::not_found("No user with this phone number"));
    };
    let code = state.otp.issue(phone).await;
    let minutes = state.otp.ttl().as_secs().div_ceil(60);
    let text = messaging::otp_text(&code, minutes)?;
    state.sms.send(phone, &text).await?;
    Ok(Envelope::message("OTP sent"))
}

async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OtpVerifyRequest>,
) -> Result<Envelope<SessionResponse>, AppError> {
    let code = request
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::validation("Code is required"))?;
    let mut user = user_for_phone(&state, request.phone_number).await?;
    let phone = user.phone_number.clone().unwrap_or_default();
    if !state.otp.verify(&phone, &code).await {
        return Err(AppError::validation("Invalid or expired code"));
    }
    user.verified = true;
    let user = state.users.save(&user).await?;
    info!(user_id = %user.id, "phone number verified");
    Ok(Envelope::ok("OTP verified", session(&state, user)?))
}
