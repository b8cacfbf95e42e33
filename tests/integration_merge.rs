//! Integration test for identity merge: the overlapping-weekly-bucket case.
//!
//! Both weekly_metrics and weekly_reports carry a UNIQUE (user_id,
//! week_start) constraint. If the anonymous user and the real user both
//! have data for the same ISO week, re-attributing those rows with a plain
//! `UPDATE ... SET user_id` collides with the real user's existing row for
//! that week. This must collapse into one row per week instead of failing
//! the merge transaction.

use chrono::Utc;
use uuid::Uuid;
use workout_sync::ingestion::{IngestionService, NewEventCandidate};
use workout_sync::merge::MergeService;
use workout_sync::metrics::{week_start, WeeklyAggregator};

mod common;

fn workout_events(workout_id: Uuid, exercise_id: Uuid, set_id: Uuid) -> Vec<NewEventCandidate> {
    let started_at = Utc::now();
    let ended_at = started_at + chrono::Duration::minutes(30);
    vec![
        NewEventCandidate {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutStarted".to_string(),
            payload: serde_json::json!({"workout_id": workout_id, "started_at": started_at}),
            sequence_number: 1,
        },
        NewEventCandidate {
            event_id: Uuid::new_v4(),
            event_type: "SetCompleted".to_string(),
            payload: serde_json::json!({
                "workout_id": workout_id,
                "exercise_id": exercise_id,
                "set_id": set_id,
                "reps": 10,
                "weight": "100.0",
                "completed_at": ended_at,
            }),
            sequence_number: 2,
        },
        NewEventCandidate {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutEnded".to_string(),
            payload: serde_json::json!({"workout_id": workout_id, "ended_at": ended_at}),
            sequence_number: 3,
        },
    ]
}

#[tokio::test]
async fn test_merge_collapses_overlapping_weekly_buckets() {
    let pool = common::setup_test_db().await;
    let anonymous_user_id = common::seed_anonymous_user(&pool).await;
    let real_user_id = common::seed_user(&pool).await;
    let exercise_id = common::seed_exercise(&pool, "Deadlift").await;

    let ingestion = IngestionService::new(pool.clone());

    // Both users work out "now" — same ISO week for both, by construction.
    ingestion
        .ingest(
            Uuid::new_v4(),
            anonymous_user_id,
            workout_events(Uuid::new_v4(), exercise_id, Uuid::new_v4()),
            None,
        )
        .await
        .unwrap();
    ingestion
        .ingest(
            Uuid::new_v4(),
            real_user_id,
            workout_events(Uuid::new_v4(), exercise_id, Uuid::new_v4()),
            None,
        )
        .await
        .unwrap();

    let week = week_start(Utc::now());
    let aggregator = WeeklyAggregator::new(pool.clone());

    // Precondition: both users already have a weekly_metrics row for the
    // same week before the merge — this is exactly the collision scenario.
    assert!(aggregator
        .get_weekly_metrics(anonymous_user_id, week)
        .await
        .unwrap()
        .is_some());
    let real_before = aggregator
        .get_weekly_metrics(real_user_id, week)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(real_before.total_workouts, 1);

    let merge_service = MergeService::new(pool.clone());
    let result = merge_service
        .merge(anonymous_user_id, real_user_id)
        .await
        .unwrap();

    assert!(result.merged);
    assert_eq!(result.events_updated, 3);
    assert_eq!(result.workouts_updated, 1);

    // The anonymous user's week has been folded into the real user's row,
    // not left dangling or duplicated.
    assert!(aggregator
        .get_weekly_metrics(anonymous_user_id, week)
        .await
        .unwrap()
        .is_none());

    let real_after = aggregator
        .get_weekly_metrics(real_user_id, week)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(real_after.total_workouts, 2);
    assert_eq!(real_after.total_volume, real_before.total_volume * rust_decimal::Decimal::from(2));

    // Re-running the merge is a no-op now that the anonymous user has no
    // events left (and no row at all — it was deleted).
    let second = merge_service
        .merge(anonymous_user_id, real_user_id)
        .await
        .unwrap();
    assert!(!second.merged);
}
