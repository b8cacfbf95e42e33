//! Event Store Errors
//!
//! Error types for event store operations.

use uuid::Uuid;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// event_id collided on insert — a concurrent writer raced us.
    #[error("unique constraint violation for event {0}")]
    UniqueViolation(Uuid),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Whether this looks like a unique-key collision rather than a
    /// genuine infrastructure failure (per spec §4.3 step 4).
    pub fn is_unique_violation(&self) -> bool {
        match self {
            EventStoreError::UniqueViolation(_) => true,
            EventStoreError::Database(e) => e
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            EventStoreError::Serialization(_) => false,
        }
    }
}
