//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure. These represent
//! the error taxonomy in spec §7 — business-rule and invariant failures,
//! independent of the HTTP/web layer.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// The Payload Validator rejected an event's payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A batch's sequence_numbers were not strictly increasing.
    #[error("batch shape invalid: sequence numbers must be strictly increasing")]
    BatchShapeInvalid,

    /// Every event in a batch was rejected.
    #[error("no events were accepted")]
    NoneAccepted,

    /// Incremental projection update failed; events remain durable.
    #[error("projection update failed: {0}")]
    ProjectionUpdateFailed(String),

    /// Full rebuild failed partway through.
    #[error("rebuild failed: {0}")]
    RebuildFailed(String),

    /// Identity merge preconditions were violated.
    #[error("merge invalid: {0}")]
    MergeInvalid(String),

    /// Identity merge transaction failed.
    #[error("merge failed: {0}")]
    MergeFailed(String),

    /// A referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    /// A referenced workout does not exist.
    #[error("workout not found: {0}")]
    WorkoutNotFound(Uuid),
}

impl DomainError {
    /// Client errors (4xx): the caller sent something invalid.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload(_)
                | Self::BatchShapeInvalid
                | Self::NoneAccepted
                | Self::MergeInvalid(_)
                | Self::UserNotFound(_)
                | Self::WorkoutNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_shape_invalid_is_client_error() {
        assert!(DomainError::BatchShapeInvalid.is_client_error());
    }

    #[test]
    fn rebuild_failed_is_not_client_error() {
        assert!(!DomainError::RebuildFailed("boom".into()).is_client_error());
    }

    #[test]
    fn merge_failed_is_not_client_error() {
        assert!(!DomainError::MergeFailed("boom".into()).is_client_error());
    }
}
