//! Sync Handler
//!
//! HTTP-facing wrapper over the Ingestion Service: checks that the
//! authenticated caller matches the command's user_id, then delegates.

use sqlx::PgPool;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::ingestion::IngestionService;

use super::{AckCursor, SyncCommand, SyncResult};

pub struct SyncHandler {
    ingestion: IngestionService,
}

impl SyncHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ingestion: IngestionService::new(pool),
        }
    }

    pub async fn execute(
        &self,
        command: SyncCommand,
        context: &OperationContext,
    ) -> Result<SyncResult, AppError> {
        match context.request_user_id {
            Some(request_user_id) if request_user_id == command.user_id => {}
            Some(_) => return Err(AppError::Forbidden("user_id mismatch".to_string())),
            None => return Err(AppError::MissingHeader("X-Request-User-Id".to_string())),
        }

        let outcome = self
            .ingestion
            .ingest(
                command.device_id,
                command.user_id,
                command.events,
                context.correlation_id,
            )
            .await?;

        Ok(SyncResult {
            ack_cursor: AckCursor {
                device_id: command.device_id,
                last_acked_sequence: outcome.last_acked_sequence,
            },
            accepted_count: outcome.accepted_count,
            rejected_count: outcome.rejected_count,
            rejected_event_ids: outcome.rejected_event_ids,
        })
    }
}
