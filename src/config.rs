use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use crate::error::AppError;

const DEV_JWT_SECRET: &str = "change-me-dev-only-jwt-secret";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub google_maps_api_key: Option<String>,
    pub client_url: String,
    pub mail_sender: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tripsync.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if cfg!(debug_assertions) => DEV_JWT_SECRET.to_string(),
            _ => return Err(AppError::Config("JWT_SECRET must be set".into())),
        };

        let access_token_ttl = Duration::from_secs(env_number("ACCESS_TOKEN_TTL_SECS", 3600)?);
        let refresh_token_ttl =
            Duration::from_secs(env_number("REFRESH_TOKEN_TTL_SECS", 30 * 24 * 3600)?);
        let otp_ttl = Duration::from_secs(env_number("OTP_TTL_SECS", 300)?);

        let google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let client_url =
            env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let mail_sender =
            env::var("MAIL_SENDER_ADDRESS").unwrap_or_else(|_| "no-reply@tripsync.local".into());

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            otp_ttl,
            google_maps_api_key,
            client_url,
            mail_sender,
        })
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
