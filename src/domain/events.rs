//! Domain Events
//!
//! Canonical event types the ingestion pipeline accepts, and the payload
//! schemas each one must validate against. Events are immutable facts;
//! this module is the boundary between untyped JSON ingress and the typed
//! values the projection updater consumes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// The four event types the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventType {
    WorkoutStarted,
    WorkoutEnded,
    ExerciseAdded,
    SetCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::WorkoutStarted => "WorkoutStarted",
            EventType::WorkoutEnded => "WorkoutEnded",
            EventType::ExerciseAdded => "ExerciseAdded",
            EventType::SetCompleted => "SetCompleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WorkoutStarted" => Some(EventType::WorkoutStarted),
            "WorkoutEnded" => Some(EventType::WorkoutEnded),
            "ExerciseAdded" => Some(EventType::ExerciseAdded),
            "SetCompleted" => Some(EventType::SetCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload for `WorkoutStarted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutStartedPayload {
    pub workout_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Payload for `WorkoutEnded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutEndedPayload {
    pub workout_id: Uuid,
    pub ended_at: DateTime<Utc>,
}

/// Payload for `ExerciseAdded`. Retained for audit only — the projection
/// updater does not materialize it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseAddedPayload {
    pub workout_id: Uuid,
    pub exercise_id: Uuid,
    pub exercise_name: String,
}

/// Payload for `SetCompleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCompletedPayload {
    pub workout_id: Uuid,
    pub exercise_id: Uuid,
    pub set_id: Uuid,
    pub reps: i32,
    pub weight: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// A payload that has passed schema and numeric-constraint validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ValidatedEvent {
    WorkoutStarted(WorkoutStartedPayload),
    WorkoutEnded(WorkoutEndedPayload),
    ExerciseAdded(ExerciseAddedPayload),
    SetCompleted(SetCompletedPayload),
}

impl ValidatedEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ValidatedEvent::WorkoutStarted(_) => EventType::WorkoutStarted,
            ValidatedEvent::WorkoutEnded(_) => EventType::WorkoutEnded,
            ValidatedEvent::ExerciseAdded(_) => EventType::ExerciseAdded,
            ValidatedEvent::SetCompleted(_) => EventType::SetCompleted,
        }
    }
}

/// Validate a raw (event_type, payload) pair against its schema.
///
/// Does not perform cross-event checks (e.g. whether the referenced workout
/// exists) — that is the projection updater's job.
pub fn validate_event_payload(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<ValidatedEvent, DomainError> {
    let event_type = EventType::parse(event_type)
        .ok_or_else(|| DomainError::InvalidPayload(format!("unknown event type: {event_type}")))?;

    let validated = match event_type {
        EventType::WorkoutStarted => {
            let p: WorkoutStartedPayload = deserialize_payload(payload)?;
            ValidatedEvent::WorkoutStarted(p)
        }
        EventType::WorkoutEnded => {
            let p: WorkoutEndedPayload = deserialize_payload(payload)?;
            ValidatedEvent::WorkoutEnded(p)
        }
        EventType::ExerciseAdded => {
            let p: ExerciseAddedPayload = deserialize_payload(payload)?;
            ValidatedEvent::ExerciseAdded(p)
        }
        EventType::SetCompleted => {
            let p: SetCompletedPayload = deserialize_payload(payload)?;
            if p.reps <= 0 {
                return Err(DomainError::InvalidPayload(format!(
                    "reps must be > 0, got {}",
                    p.reps
                )));
            }
            if p.weight <= Decimal::ZERO {
                return Err(DomainError::InvalidPayload(format!(
                    "weight must be > 0, got {}",
                    p.weight
                )));
            }
            ValidatedEvent::SetCompleted(p)
        }
    };

    Ok(validated)
}

fn deserialize_payload<T: serde::de::DeserializeOwned>(
    payload: &serde_json::Value,
) -> Result<T, DomainError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| DomainError::InvalidPayload(format!("malformed payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_workout_started() {
        let payload = json!({
            "workout_id": Uuid::new_v4(),
            "started_at": Utc::now(),
        });
        let validated = validate_event_payload("WorkoutStarted", &payload).unwrap();
        assert_eq!(validated.event_type(), EventType::WorkoutStarted);
    }

    #[test]
    fn rejects_unknown_event_type() {
        let err = validate_event_payload("NotARealEvent", &json!({})).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_missing_field() {
        let payload = json!({ "workout_id": Uuid::new_v4() });
        let err = validate_event_payload("WorkoutStarted", &payload).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_non_positive_reps() {
        let payload = json!({
            "workout_id": Uuid::new_v4(),
            "exercise_id": Uuid::new_v4(),
            "set_id": Uuid::new_v4(),
            "reps": 0,
            "weight": "10.0",
            "completed_at": Utc::now(),
        });
        let err = validate_event_payload("SetCompleted", &payload).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_non_positive_weight() {
        let payload = json!({
            "workout_id": Uuid::new_v4(),
            "exercise_id": Uuid::new_v4(),
            "set_id": Uuid::new_v4(),
            "reps": 10,
            "weight": "-5.0",
            "completed_at": Utc::now(),
        });
        let err = validate_event_payload("SetCompleted", &payload).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload(_)));
    }

    #[test]
    fn accepts_valid_set_completed() {
        let payload = json!({
            "workout_id": Uuid::new_v4(),
            "exercise_id": Uuid::new_v4(),
            "set_id": Uuid::new_v4(),
            "reps": 10,
            "weight": "100.0",
            "completed_at": Utc::now(),
        });
        let validated = validate_event_payload("SetCompleted", &payload).unwrap();
        assert_eq!(validated.event_type(), EventType::SetCompleted);
    }
}
