//! Integration tests for the Projection Updater and the full Rebuilder:
//! the degraded-placeholder edge case, orphaned sets, and rebuild
//! determinism across a mix of both.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use workout_sync::domain::{
    SetCompletedPayload, ValidatedEvent, WorkoutEndedPayload, WorkoutStartedPayload,
};
use workout_sync::event_store::{EventStore, NewEventRow};
use workout_sync::projection::{ProjectionRebuilder, ProjectionUpdater};
use workout_sync::query::QueryService;

mod common;

#[tokio::test]
async fn test_workout_ended_before_started_synthesizes_degraded_placeholder() {
    let pool = common::setup_test_db().await;
    let user_id = common::seed_user(&pool).await;
    let updater = ProjectionUpdater::new(pool.clone());
    let query = QueryService::new(pool);

    let workout_id = Uuid::new_v4();
    let ended_at = Utc::now();
    let events = vec![ValidatedEvent::WorkoutEnded(WorkoutEndedPayload {
        workout_id,
        ended_at,
    })];

    updater.apply_events(user_id, &events).await.unwrap();

    let workouts = query.list_workouts(user_id).await.unwrap();
    assert_eq!(workouts.len(), 1);
    let workout = &workouts[0];
    assert_eq!(workout.status, "completed");
    assert_eq!(workout.started_at, workout.ended_at.unwrap());
}

#[tokio::test]
async fn test_set_completed_for_unknown_workout_is_skipped_not_errored() {
    let pool = common::setup_test_db().await;
    let user_id = common::seed_user(&pool).await;
    let exercise_id = common::seed_exercise(&pool, "Bench Press").await;
    let updater = ProjectionUpdater::new(pool.clone());
    let query = QueryService::new(pool);

    let unknown_workout_id = Uuid::new_v4();
    let events = vec![ValidatedEvent::SetCompleted(SetCompletedPayload {
        workout_id: unknown_workout_id,
        exercise_id,
        set_id: Uuid::new_v4(),
        reps: 10,
        weight: Decimal::new(1000, 1),
        completed_at: Utc::now(),
    })];

    // Must not fail the batch even though the referenced workout never existed.
    updater.apply_events(user_id, &events).await.unwrap();

    let sets = query.list_sets(unknown_workout_id).await.unwrap();
    assert!(sets.is_empty());
}

#[tokio::test]
async fn test_rebuild_is_deterministic_across_placeholder_and_orphan_events() {
    let pool = common::setup_test_db().await;
    let user_id = common::seed_user(&pool).await;
    let exercise_id = common::seed_exercise(&pool, "Squat").await;
    let device_id = Uuid::new_v4();
    let event_store = EventStore::new(pool.clone());

    let normal_workout_id = Uuid::new_v4();
    let degraded_workout_id = Uuid::new_v4();
    let orphan_workout_id = Uuid::new_v4();
    let started_at = Utc::now();
    let ended_at = started_at + chrono::Duration::minutes(45);
    let set_id = Uuid::new_v4();

    let rows = vec![
        NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutStarted".to_string(),
            payload: serde_json::to_value(WorkoutStartedPayload {
                workout_id: normal_workout_id,
                started_at,
            })
            .unwrap(),
            sequence_number: 1,
            correlation_id: None,
        },
        NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutEnded".to_string(),
            payload: serde_json::to_value(WorkoutEndedPayload {
                workout_id: normal_workout_id,
                ended_at,
            })
            .unwrap(),
            sequence_number: 2,
            correlation_id: None,
        },
        NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "SetCompleted".to_string(),
            payload: serde_json::to_value(SetCompletedPayload {
                workout_id: normal_workout_id,
                exercise_id,
                set_id,
                reps: 5,
                weight: Decimal::new(2000, 1),
                completed_at: ended_at,
            })
            .unwrap(),
            sequence_number: 3,
            correlation_id: None,
        },
        // WorkoutEnded with no prior WorkoutStarted anywhere in the log.
        NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutEnded".to_string(),
            payload: serde_json::to_value(WorkoutEndedPayload {
                workout_id: degraded_workout_id,
                ended_at,
            })
            .unwrap(),
            sequence_number: 4,
            correlation_id: None,
        },
        // SetCompleted referencing a workout_id with no events at all.
        NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "SetCompleted".to_string(),
            payload: serde_json::to_value(SetCompletedPayload {
                workout_id: orphan_workout_id,
                exercise_id,
                set_id: Uuid::new_v4(),
                reps: 8,
                weight: Decimal::new(1000, 1),
                completed_at: ended_at,
            })
            .unwrap(),
            sequence_number: 5,
            correlation_id: None,
        },
    ];

    event_store
        .append_batch(device_id, user_id, &rows)
        .await
        .unwrap();

    let rebuilder = ProjectionRebuilder::new(pool.clone());
    let query = QueryService::new(pool);

    rebuilder.rebuild_all().await.unwrap();
    let mut workouts_first = query.list_workouts(user_id).await.unwrap();
    workouts_first.sort_by_key(|w| w.workout_id);

    assert_eq!(workouts_first.len(), 2);
    assert!(workouts_first.iter().any(|w| w.workout_id == normal_workout_id
        && w.status == "completed"
        && w.set_count == 1));
    assert!(workouts_first
        .iter()
        .any(|w| w.workout_id == degraded_workout_id
            && w.status == "completed"
            && w.started_at == w.ended_at.unwrap()));
    assert!(!workouts_first
        .iter()
        .any(|w| w.workout_id == orphan_workout_id));

    // Running rebuild a second time must reproduce the exact same read model.
    rebuilder.rebuild_all().await.unwrap();
    let mut workouts_second = query.list_workouts(user_id).await.unwrap();
    workouts_second.sort_by_key(|w| w.workout_id);

    assert_eq!(workouts_first.len(), workouts_second.len());
    for (a, b) in workouts_first.iter().zip(workouts_second.iter()) {
        assert_eq!(a.workout_id, b.workout_id);
        assert_eq!(a.started_at, b.started_at);
        assert_eq!(a.ended_at, b.ended_at);
        assert_eq!(a.status, b.status);
        assert_eq!(a.set_count, b.set_count);
        assert_eq!(a.total_volume, b.total_volume);
    }
}
