//! Merge Handler
//!
//! HTTP-facing wrapper over the Identity Merge operation.

use sqlx::PgPool;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::merge::MergeService;

use super::MergeCommand;

pub struct MergeHandler {
    merge: MergeService,
}

impl MergeHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            merge: MergeService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: MergeCommand,
        context: &OperationContext,
    ) -> Result<crate::merge::MergeResult, AppError> {
        let real_user_id = context
            .request_user_id
            .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))?;

        if real_user_id == command.anonymous_user_id {
            return Err(AppError::InvalidRequest(
                "cannot merge a user into itself".to_string(),
            ));
        }

        let result = self
            .merge
            .merge(command.anonymous_user_id, real_user_id)
            .await?;

        Ok(result)
    }
}
