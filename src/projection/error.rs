//! Projection Errors

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event store error: {0}")]
    EventStore(#[from] crate::event_store::EventStoreError),
}
