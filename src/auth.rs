use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;
use fast_chemail::is_valid_email;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        session::{Claims, TokenKind, TokenPair, TokenUser},
        user::{User, UserRole},
    },
    state::AppState,
};

pub const AUTH_HEADER: &str = "x-auth-token";
pub const MIN_PASSWORD_LEN: usize = 6;

/// Caller identity taken from a verified, unrevoked access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub role: UserRole,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".into()))?;
        let claims = state.tokens.verify(&token, TokenKind::Access).await?;
        Ok(Self {
            id: claims.user.id.clone(),
            role: claims.user.role,
            claims,
        })
    }
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<&Self, AppError> {
        if self.is_admin() {
            Ok(self)
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }

    /// Passes when the caller is `user_id` or an admin.
    pub fn require_self(&self, user_id: &str) -> Result<&Self, AppError> {
        if self.id == user_id || self.is_admin() {
            Ok(self)
        } else {
            Err(AppError::Forbidden("You're not allowed to do that!".into()))
        }
    }
}

/// `x-auth-token` wins over `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let custom = headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let bearer = || {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    custom.or_else(bearer).map(str::to_string)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Issues and checks signed tokens and keeps the revocation list.
#[derive(Clone)]
pub struct TokenService {
    db: DbPool,
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(db: DbPool, secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            db,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user: &User, kind: TokenKind) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now().timestamp();
        let claims = Claims {
            user: TokenUser {
                id: user.id.clone(),
                role: user.role,
            },
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2),
            kind,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AppError::Other(anyhow::anyhow!("token encoding failed: {err}")))
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            token: self.issue(user, TokenKind::Access)?,
            refresh_token: self.issue(user, TokenKind::Refresh)?,
        })
    }

    /// Signature, expiry, kind and revocation are all checked.
    pub async fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|err| {
                debug!("token rejected: {err}");
                AppError::Forbidden("Token is not valid".into())
            })?
            .claims;
        if claims.kind != expected {
            return Err(AppError::Forbidden("Token is not valid".into()));
        }
        if self.is_revoked(&claims.jti).await? {
            return Err(AppError::Forbidden("Token is invalid or expired".into()));
        }
        Ok(claims)
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM revoked_tokens WHERE jti = ?1")
            .bind(jti)
            .fetch_optional(&self.db)
            .await?;
        Ok(hit.is_some())
    }

    /// Records the token as revoked until its own expiry; entries past
    /// expiry are dropped on the way since the token is dead anyway.
    pub async fn revoke(&self, claims: &Claims) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?1")
            .bind(now)
            .execute(&self.db)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)")
            .bind(&claims.jti)
            .bind(claims.exp)
            .execute(&self.db)
            .await?;
        info!(user_id = %claims.user.id, "token revoked");
        Ok(())
    }
}

pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let name = name.trim();
    let email = email.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if !is_plausible_email(&email) {
        return Err(AppError::validation("Please include a valid email"));
    }
    validate_password(password)?;
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        phone_number: None,
        password_hash: Some(hash_password(password)?),
        verified: false,
        role: UserRole::User,
        latitude: None,
        longitude: None,
        vehicle_type: None,
        created_at: now,
        updated_at: now,
    };
    state.users.insert(&user).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::validation("Email is invalid"))?;
    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash));
    if !matches {
        return Err(AppError::validation("Password is invalid"));
    }
    Ok(user)
}

/// Address syntax check; single-label domains are refused too.
pub fn is_plausible_email(email: &str) -> bool {
    is_valid_email(email)
        && email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.'))
}
