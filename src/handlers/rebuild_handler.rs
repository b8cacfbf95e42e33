//! Rebuild Handler
//!
//! Backs `POST /projections/rebuild`. A maintenance operation, not part of
//! normal request traffic — deliberately has no command payload.

use sqlx::PgPool;

use crate::domain::DomainError;
use crate::error::AppError;
use crate::projection::ProjectionRebuilder;

pub struct RebuildHandler {
    rebuilder: ProjectionRebuilder,
}

impl RebuildHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            rebuilder: ProjectionRebuilder::new(pool),
        }
    }

    pub async fn execute(&self) -> Result<(), AppError> {
        self.rebuilder
            .rebuild_all()
            .await
            .map_err(|e| DomainError::RebuildFailed(e.to_string()))?;
        Ok(())
    }
}
