//! Users
//!
//! The User row itself: registered users carry email/password_hash set by
//! an external auth layer (out of scope here); anonymous users are created
//! with neither, and are eligible to be merged into a registered user
//! exactly once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_anonymous: bool,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new anonymous user (no credentials).
    pub async fn create_anonymous(&self) -> Result<User, sqlx::Error> {
        let user_id = Uuid::new_v4();

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (user_id, email, password_hash, is_anonymous, gender, age)
            VALUES ($1, NULL, NULL, true, NULL, NULL)
            RETURNING user_id, email, is_anonymous, gender, age, created_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT user_id, email, is_anonymous, gender, age, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}
