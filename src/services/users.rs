use chrono::Utc;
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::user::User};

const USER_COLUMNS: &str = "id, name, email, phone_number, password_hash, verified, role, \
     latitude, longitude, vehicle_type, created_at, updated_at";

#[derive(Clone)]
pub struct UserStore {
    db: DbPool,
}

impl UserStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO users (id, name, email, phone_number, password_hash, verified, role,
                latitude, longitude, vehicle_type, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .bind(user.verified)
        .bind(user.role)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(&user.vehicle_type)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(unique_violation_as_conflict)?;
        Ok(())
    }

    /// Identifiers that are not UUIDs resolve to `None`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        if Uuid::parse_str(id.trim()).is_err() {
            return Ok(None);
        }
        self.find_where("id", id.trim()).await
    }

    pub async fn get(&self, id: &str) -> Result<User, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User doesn't exist"))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_where("email", email).await
    }

    pub async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, AppError> {
        self.find_where("phone_number", phone_number).await
    }

    async fn find_where(&self, column: &str, value: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Writes profile fields and the password hash back; bumps `updated_at`.
    pub async fn save(&self, user: &User) -> Result<User, AppError> {
        let mut saved = user.clone();
        saved.updated_at = Utc::now();
        sqlx::query(
            r#"UPDATE users SET name = ?2, phone_number = ?3, password_hash = ?4, verified = ?5,
                latitude = ?6, longitude = ?7, vehicle_type = ?8, updated_at = ?9
               WHERE id = ?1"#,
        )
        .bind(&saved.id)
        .bind(&saved.name)
        .bind(&saved.phone_number)
        .bind(&saved.password_hash)
        .bind(saved.verified)
        .bind(saved.latitude)
        .bind(saved.longitude)
        .bind(&saved.vehicle_type)
        .bind(saved.updated_at)
        .execute(&self.db)
        .await
        .map_err(unique_violation_as_conflict)?;
        Ok(saved)
    }
}

fn unique_violation_as_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("A user with these details already exists".into())
        }
        _ => AppError::Database(err),
    }
}
