//! Domain module
//!
//! Core domain types and business logic: event schemas, the payload
//! validator, operation context, and the domain error taxonomy.

pub mod context;
pub mod error;
pub mod events;

pub use context::OperationContext;
pub use error::DomainError;
pub use events::{
    validate_event_payload, EventType, ExerciseAddedPayload, SetCompletedPayload, ValidatedEvent,
    WorkoutEndedPayload, WorkoutStartedPayload,
};
