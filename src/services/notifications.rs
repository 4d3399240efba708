use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::notification::Notification};

#[derive(Clone)]
pub struct NotificationStore {
    db: DbPool,
}

impl NotificationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: Option<String>,
        title: Option<String>,
        message: Option<String>,
    ) -> Result<Notification, AppError> {
        let filled = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let (Some(user_id), Some(title), Some(message)) =
            (filled(user_id), filled(title), filled(message))
        else {
            return Err(AppError::validation("All fields are required"));
        };
        let notification = Notification::new(user_id, title, message);
        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, title, message, is_read, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.db)
        .await?;
        Ok(notification)
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let items = sqlx::query_as::<_, Notification>(
            r#"SELECT id, user_id, title, message, is_read, created_at
               FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    /// Malformed ids resolve to `None`.
    pub async fn find(&self, id: &str) -> Result<Option<Notification>, AppError> {
        if Uuid::parse_str(id).is_err() {
            return Ok(None);
        }
        let found = sqlx::query_as::<_, Notification>(
            r#"SELECT id, user_id, title, message, is_read, created_at
               FROM notifications WHERE id = ?1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(found)
    }

    pub async fn mark_read(&self, id: &str) -> Result<Notification, AppError> {
        if Uuid::parse_str(id).is_err() {
            return Err(AppError::validation("Invalid notification ID"));
        }
        let updated = sqlx::query_as::<_, Notification>(
            r#"UPDATE notifications SET is_read = 1 WHERE id = ?1
               RETURNING id, user_id, title, message, is_read, created_at"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        updated.ok_or_else(|| AppError::not_found("Notification not found"))
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Notification not found"));
        }
        Ok(())
    }
}
