//! Anonymous User Handler
//!
//! Backs `POST /users/anonymous`. Stripped down from the teacher's
//! CreateUserHandler shape (command struct + handler struct over a pool) —
//! no wallet/account/event-sourcing machinery applies to a plain user row.

use sqlx::PgPool;

use crate::error::AppError;
use crate::users::{User, UserRepository};

pub struct AnonymousUserHandler {
    users: UserRepository,
}

impl AnonymousUserHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    pub async fn execute(&self) -> Result<User, AppError> {
        let user = self.users.create_anonymous().await?;
        Ok(user)
    }
}
